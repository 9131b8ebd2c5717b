//! Endpoint name resolution.
//!
//! Maps a logical pipe name onto the platform rendezvous resource:
//! - Unix: `<socket_dir>/<name>`, or `<name>` verbatim when it is absolute
//! - Windows: `\\.\pipe\<pipe_prefix><name>`
//!
//! Resolution is pure: it never touches the filesystem, so the listening
//! and connecting sides always land on the same resource.

use std::fmt;

#[cfg(unix)]
use std::path::{Path, PathBuf};

use crate::config::PipeConfig;
use crate::error::{PipeError, Result};

/// Longest socket path accepted, excluding the trailing NUL.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_SOCKET_PATH: usize = 107;

/// Longest socket path accepted, excluding the trailing NUL.
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
pub const MAX_SOCKET_PATH: usize = 103;

/// Longest named-pipe identifier accepted by `CreateNamedPipe`.
#[cfg(windows)]
pub const MAX_PIPE_NAME: usize = 256;

#[cfg(windows)]
const PIPE_NAMESPACE: &str = r"\\.\pipe\";

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeAddress {
    name: String,
    #[cfg(unix)]
    path: PathBuf,
    #[cfg(windows)]
    pipe_name: String,
}

impl PipeAddress {
    /// Resolve `name` against the namespace described by `config`.
    pub fn resolve(name: &str, config: &PipeConfig) -> Result<Self> {
        if name.is_empty() {
            return Err(invalid(name, "name is empty"));
        }
        if name.contains('\0') {
            return Err(invalid(name, "name contains a NUL byte"));
        }
        Self::resolve_platform(name, config)
    }

    #[cfg(unix)]
    fn resolve_platform(name: &str, config: &PipeConfig) -> Result<Self> {
        let path = if name.starts_with('/') {
            PathBuf::from(name)
        } else if name.contains('/') {
            return Err(invalid(name, "relative names must not contain '/'"));
        } else {
            config.socket_dir.join(name)
        };

        let len = path.as_os_str().len();
        if len > MAX_SOCKET_PATH {
            return Err(invalid(
                name,
                &format!("socket path is {len} bytes (max {MAX_SOCKET_PATH})"),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    #[cfg(windows)]
    fn resolve_platform(name: &str, config: &PipeConfig) -> Result<Self> {
        if name.contains('\\') || name.contains('/') {
            return Err(invalid(name, "name must not contain path separators"));
        }

        let pipe_name = format!("{PIPE_NAMESPACE}{}{name}", config.pipe_prefix);
        if pipe_name.len() > MAX_PIPE_NAME {
            return Err(invalid(
                name,
                &format!("pipe name is {} bytes (max {MAX_PIPE_NAME})", pipe_name.len()),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            pipe_name,
        })
    }

    /// The logical name this address was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem path of the socket file.
    #[cfg(unix)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full named-pipe identifier.
    #[cfg(windows)]
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }
}

impl fmt::Display for PipeAddress {
    #[cfg(unix)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }

    #[cfg(windows)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pipe_name)
    }
}

fn invalid(name: &str, reason: &str) -> PipeError {
    PipeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
