//! Protocol module - pipe modes, wire format and framing.
//!
//! This module turns a raw byte connection into one of the two pipe modes:
//! - MESSAGE: 4-byte big-endian length prefix + payload
//! - STREAM: unframed pass-through

pub mod framing;
mod mode;
mod wire_format;

pub use mode::PipeMode;
pub use wire_format::{
    checked_len, decode_message, decode_prefix, encode_message, encode_prefix, MAX_MESSAGE_SIZE,
    PREFIX_SIZE,
};
