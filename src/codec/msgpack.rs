//! MsgPack codec using `rmp-serde`.
//!
//! Structs are written with `to_vec_named` (maps keyed by field name), so
//! peers in other languages can decode them without knowing field order.
//!
//! # Example
//!
//! ```
//! use protopipe::codec::{Codec, MsgPackCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    #[inline]
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
