//! # protopipe
//!
//! Local inter-process pipes with two wire models on one API.
//!
//! A [`Pipe`] is created in one of two modes:
//!
//! - **MESSAGE**: discrete datagrams. Every `send` arrives whole in exactly
//!   one `recv`, in order. On the wire each message is a 4-byte big-endian
//!   length followed by the payload.
//! - **STREAM**: an unframed byte stream. Bytes arrive in order with no
//!   boundary guarantee.
//!
//! Endpoints are named. On Unix a name maps to a socket file (default
//! directory `/tmp`); on Windows to `\\.\pipe\protopipe-<name>`.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//!
//! use protopipe::{Pipe, PipeMode};
//!
//! # fn main() -> protopipe::Result<()> {
//! let server = Arc::new(Pipe::new(PipeMode::Stream)?);
//! server.listen("chan2")?;
//!
//! let peer = Arc::clone(&server);
//! let handle = thread::spawn(move || -> protopipe::Result<()> {
//!     peer.accept()?;
//!     while let Some(chunk) = peer.recv(4096)? {
//!         println!("{} bytes", chunk.len());
//!     }
//!     Ok(())
//! });
//!
//! let client = Pipe::new(PipeMode::Stream)?;
//! client.connect("chan2")?;
//! client.send(b"abc")?;
//! client.close();
//! # let _ = handle.join();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod peers;
mod pipe;

pub use config::PipeConfig;
pub use error::{PipeError, Result};
pub use pipe::{Pipe, PipeBuilder, PipeState};
pub use protocol::PipeMode;
pub use transport::PipeAddress;
