//! Error types for protopipe.

use std::io;

use thiserror::Error;

/// Main error type for all pipe operations.
///
/// Every variant is scoped to the handle that produced it; none of them is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The endpoint name cannot be mapped onto the platform namespace.
    #[error("Invalid pipe name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A live listener already occupies the endpoint.
    #[error("Pipe name already in use: {0}")]
    AddressInUse(String),

    /// The OS refused access to the endpoint.
    #[error("Permission denied for pipe: {0}")]
    PermissionDenied(String),

    /// No listener exists at the endpoint.
    #[error("No listener found for pipe: {0}")]
    NotFound(String),

    /// Send/Recv attempted while the handle is not connected.
    #[error("Pipe is not connected")]
    NotConnected,

    /// Operation not valid for the handle's mode or current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Peer terminated abnormally (including EOF in the middle of a message).
    #[error("Connection reset by peer")]
    ConnectionReset,

    /// Write attempted after the peer went away.
    #[error("Broken pipe")]
    BrokenPipe,

    /// Operation interrupted by a concurrent `close()`.
    #[error("Pipe closed")]
    Closed,

    /// Declared message length exceeds the receive limit (or the wire limit on send).
    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { size: u64, max: u64 },

    /// Unclassified OS error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload serialization failed.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Payload deserialization failed.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl PipeError {
    /// Classify an I/O error raised on an established connection.
    ///
    /// Reset-like kinds collapse into [`PipeError::ConnectionReset`], a gone
    /// peer on write into [`PipeError::BrokenPipe`]. Everything else stays `Io`.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => PipeError::ConnectionReset,
            io::ErrorKind::BrokenPipe => PipeError::BrokenPipe,
            _ => PipeError::Io(err),
        }
    }

    /// True for errors that mean the peer is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, PipeError::ConnectionReset | PipeError::BrokenPipe)
    }
}

impl From<rmp_serde::encode::Error> for PipeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        PipeError::Encode(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for PipeError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        PipeError::Decode(err.to_string())
    }
}

/// Result type alias using PipeError.
pub type Result<T> = std::result::Result<T, PipeError>;
