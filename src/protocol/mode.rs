//! Pipe mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipeError;

/// Wire model of a pipe, fixed when the handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipeMode {
    /// Discrete datagrams; every send arrives whole in exactly one recv.
    Message,
    /// Unframed byte stream with no boundary guarantee.
    Stream,
}

impl PipeMode {
    /// Upper-case name, as accepted by `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipeMode::Message => "MESSAGE",
            PipeMode::Stream => "STREAM",
        }
    }
}

impl fmt::Display for PipeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipeMode {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("message") {
            Ok(PipeMode::Message)
        } else if s.eq_ignore_ascii_case("stream") {
            Ok(PipeMode::Stream)
        } else {
            Err(PipeError::InvalidOperation(format!(
                "unknown pipe mode {s:?} (expected MESSAGE or STREAM)"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("MESSAGE".parse::<PipeMode>().unwrap(), PipeMode::Message);
        assert_eq!("stream".parse::<PipeMode>().unwrap(), PipeMode::Stream);
        assert!("DATAGRAM".parse::<PipeMode>().is_err());
    }

    #[test]
    fn test_mode_serde_uppercase() {
        let json = serde_json::to_string(&PipeMode::Stream).unwrap();
        assert_eq!(json, "\"STREAM\"");
        let mode: PipeMode = serde_json::from_str("\"MESSAGE\"").unwrap();
        assert_eq!(mode, PipeMode::Message);
        assert_eq!(mode.to_string(), "MESSAGE");
    }
}
