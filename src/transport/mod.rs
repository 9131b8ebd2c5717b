//! Transport module - platform-specific pipe/socket handling.
//!
//! Provides abstraction over:
//! - Unix Domain Sockets (Linux/macOS/Android)
//! - Named Pipes (Windows)
//!
//! Endpoint names are resolved by [`PipeAddress`]; the raw byte primitives
//! live in [`io`].

mod address;
pub mod io;
mod pipe;

pub use address::PipeAddress;
pub use pipe::{PipeListener, PipeReader, PipeStream, PipeWriter};
