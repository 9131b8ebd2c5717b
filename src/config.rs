//! Handle configuration.
//!
//! There are no configuration files or environment variables: hosts that
//! need a different namespace build a [`PipeConfig`] through
//! [`Pipe::builder`](crate::Pipe::builder).

use std::path::PathBuf;

/// Default directory for Unix domain socket rendezvous files.
#[cfg(target_os = "android")]
pub const DEFAULT_SOCKET_DIR: &str = "/data/local/tmp";

/// Default directory for Unix domain socket rendezvous files.
#[cfg(not(target_os = "android"))]
pub const DEFAULT_SOCKET_DIR: &str = "/tmp";

/// Default prefix prepended to Windows named-pipe identifiers.
pub const DEFAULT_PIPE_PREFIX: &str = "protopipe-";

/// Namespace settings used when resolving endpoint names.
///
/// Both sides of a connection must agree on these values to rendezvous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeConfig {
    /// Directory holding socket files for relative names (Unix only).
    pub socket_dir: PathBuf,
    /// Prefix for named-pipe identifiers (Windows only).
    pub pipe_prefix: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            pipe_prefix: DEFAULT_PIPE_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipeConfig::default();
        assert_eq!(config.socket_dir, PathBuf::from(DEFAULT_SOCKET_DIR));
        assert_eq!(config.pipe_prefix, "protopipe-");
    }
}
