//! Codec module - typed payloads on top of MESSAGE pipes.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (structs as maps)
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! Codecs are marker structs selected at compile time through the
//! [`Codec`] trait; there are no codec trait objects.
//!
//! # Example
//!
//! ```
//! use protopipe::codec::{Codec, JsonCodec, MsgPackCodec};
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let json = JsonCodec::encode(&[1, 2, 3]).unwrap();
//! assert_eq!(json, b"[1,2,3]");
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A payload serialization format.
pub trait Codec {
    /// Encode a value to payload bytes.
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>>;

    /// Decode payload bytes to a value.
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}
