//! Wire format encoding and decoding for MESSAGE mode.
//!
//! Every message is a 4-byte length prefix followed by the payload:
//! ```text
//! ┌──────────┬─────────────────────┐
//! │ Length   │ Payload             │
//! │ 4 bytes  │ Length bytes        │
//! │ uint32 BE│                     │
//! └──────────┴─────────────────────┘
//! ```
//!
//! STREAM mode has no wire format; bytes pass through untouched.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{PipeError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const PREFIX_SIZE: usize = 4;

/// Largest payload a prefix can declare.
pub const MAX_MESSAGE_SIZE: u64 = u32::MAX as u64;

/// Encode a payload length to its prefix bytes (Big Endian).
///
/// # Example
///
/// ```
/// use protopipe::protocol::encode_prefix;
///
/// assert_eq!(encode_prefix(5), [0, 0, 0, 5]);
/// ```
#[inline]
pub fn encode_prefix(len: u32) -> [u8; PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a payload length from prefix bytes.
///
/// Returns `None` if the buffer is too short.
#[inline]
pub fn decode_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; PREFIX_SIZE] = buf.get(..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Check a payload length against the prefix range.
pub fn checked_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PipeError::MessageTooLarge {
        size: len as u64,
        max: MAX_MESSAGE_SIZE,
    })
}

/// Build a complete message (prefix + payload) in one buffer.
///
/// # Errors
///
/// Returns `MessageTooLarge` if the payload does not fit the prefix.
pub fn encode_message(payload: &[u8]) -> Result<Bytes> {
    let len = checked_len(payload.len())?;
    let mut buf = BytesMut::with_capacity(PREFIX_SIZE + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decode one complete message from the front of `buf`.
///
/// Returns the payload and the number of bytes consumed, or `None` when
/// `buf` does not yet hold a whole message.
pub fn decode_message(buf: &[u8]) -> Option<(&[u8], usize)> {
    let len = decode_prefix(buf)? as usize;
    let end = PREFIX_SIZE.checked_add(len)?;
    let payload = buf.get(PREFIX_SIZE..end)?;
    Some((payload, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_big_endian_byte_order() {
        assert_eq!(encode_prefix(0x0102_0304), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decode_prefix(&[0x01, 0x02, 0x03, 0x04]), Some(0x0102_0304));
    }

    #[test]
    fn test_prefix_extremes() {
        assert_eq!(decode_prefix(&encode_prefix(0)), Some(0));
        assert_eq!(decode_prefix(&encode_prefix(u32::MAX)), Some(u32::MAX));
        assert_eq!(encode_prefix(u32::MAX), [0xFF; 4]);
    }

    #[test]
    fn test_decode_prefix_too_short() {
        assert_eq!(decode_prefix(&[0, 0, 1]), None);
        assert_eq!(decode_prefix(&[]), None);
    }

    #[test]
    fn test_message_roundtrip_empty() {
        let encoded = encode_message(b"").unwrap();
        assert_eq!(&encoded[..], &[0, 0, 0, 0]);

        let (payload, consumed) = decode_message(&encoded).unwrap();
        assert!(payload.is_empty());
        assert_eq!(consumed, PREFIX_SIZE);
    }

    #[test]
    fn test_message_roundtrip_one_byte() {
        let encoded = encode_message(b"x").unwrap();
        assert_eq!(&encoded[..], &[0, 0, 0, 1, b'x']);

        let (payload, consumed) = decode_message(&encoded).unwrap();
        assert_eq!(payload, b"x");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_message_max_length_prefix_waits_for_payload() {
        // A maximum-length declaration is valid; it just needs more bytes.
        let mut buf = encode_prefix(u32::MAX).to_vec();
        buf.extend_from_slice(b"partial");
        assert!(decode_message(&buf).is_none());
    }

    #[test]
    fn test_decode_leaves_following_message() {
        let mut buf = encode_message(b"first").unwrap().to_vec();
        buf.extend_from_slice(&encode_message(b"second").unwrap());

        let (first, used) = decode_message(&buf).unwrap();
        assert_eq!(first, b"first");
        let (second, _) = decode_message(&buf[used..]).unwrap();
        assert_eq!(second, b"second");
    }

    #[test]
    fn test_checked_len_limit() {
        assert_eq!(checked_len(0).unwrap(), 0);
        assert_eq!(checked_len(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_checked_len_overflow() {
        let result = checked_len(u32::MAX as usize + 1);
        assert!(matches!(result, Err(PipeError::MessageTooLarge { .. })));
    }
}
