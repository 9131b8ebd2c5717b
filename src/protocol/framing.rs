//! MESSAGE/STREAM framing over a raw pipe connection.
//!
//! - MESSAGE: `send` emits prefix + payload as one logical write; `recv`
//!   returns exactly one whole message.
//! - STREAM: `send` loops until every byte is written; `recv` performs a
//!   single read and returns whatever arrived.
//!
//! Both `recv` paths return `Ok(None)` for orderly peer shutdown, so a
//! zero-length message (`Some(empty)`) never looks like EOF.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use super::mode::PipeMode;
use super::wire_format::{decode_prefix, encode_message, PREFIX_SIZE};
use crate::error::{PipeError, Result};
use crate::transport::io::{read_chunk, read_full, write_fully};

/// Scratch size used when discarding an oversized message.
const DRAIN_CHUNK: usize = 8 * 1024;

/// Send `data` using the framing rules of `mode`.
pub async fn send<W>(mode: PipeMode, writer: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match mode {
        PipeMode::Message => send_message(writer, data).await,
        PipeMode::Stream => write_fully(writer, data).await,
    }
}

/// Receive using the framing rules of `mode`.
pub async fn recv<R>(mode: PipeMode, reader: &mut R, max_len: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    match mode {
        PipeMode::Message => recv_message(reader, max_len).await,
        PipeMode::Stream => recv_stream(reader, max_len).await,
    }
}

/// Write one length-prefixed message.
pub async fn send_message<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_message(payload)?;
    write_fully(writer, &frame).await
}

/// Read one whole message of at most `max_len` bytes.
///
/// A message declaring more than `max_len` bytes is drained and discarded,
/// then reported as `MessageTooLarge`; the connection stays aligned on the
/// next message.
pub async fn recv_message<R>(reader: &mut R, max_len: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    match recv_prefix(reader).await? {
        Some(len) => recv_payload(reader, len, max_len).await.map(Some),
        None => Ok(None),
    }
}

/// Read the length prefix of the next message.
///
/// `Ok(None)` means the peer shut down at a message boundary.
pub async fn recv_prefix<R>(reader: &mut R) -> Result<Option<u32>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_SIZE];
    match read_full(reader, &mut prefix).await? {
        0 => Ok(None),
        PREFIX_SIZE => Ok(decode_prefix(&prefix)),
        // EOF inside the prefix
        _ => Err(PipeError::ConnectionReset),
    }
}

/// Read the `len`-byte payload announced by a prefix.
pub async fn recv_payload<R>(reader: &mut R, len: u32, max_len: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let len = len as u64;
    if len > max_len as u64 {
        drain(reader, len).await?;
        tracing::warn!(size = len, max = max_len, "Discarded oversized message");
        return Err(PipeError::MessageTooLarge {
            size: len,
            max: max_len as u64,
        });
    }

    let mut payload = BytesMut::zeroed(len as usize);
    if read_full(reader, &mut payload).await? < payload.len() {
        return Err(PipeError::ConnectionReset);
    }
    Ok(payload.freeze())
}

/// Read whatever is available, up to `max_len` bytes.
pub async fn recv_stream<R>(reader: &mut R, max_len: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    if max_len == 0 {
        return Err(PipeError::InvalidOperation(
            "stream recv needs max_len > 0".to_string(),
        ));
    }
    let chunk = read_chunk(reader, max_len).await?;
    Ok((!chunk.is_empty()).then_some(chunk))
}

async fn drain<R>(reader: &mut R, mut remaining: u64) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut scratch = vec![0u8; DRAIN_CHUNK];
    while remaining > 0 {
        let want = remaining.min(DRAIN_CHUNK as u64) as usize;
        if read_full(reader, &mut scratch[..want]).await? < want {
            return Err(PipeError::ConnectionReset);
        }
        remaining -= want as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_message_boundaries_preserved() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        send_message(&mut a, b"hello").await.unwrap();
        send_message(&mut a, b"world!").await.unwrap();

        let first = recv_message(&mut b, 1024).await.unwrap().unwrap();
        let second = recv_message(&mut b, 1024).await.unwrap().unwrap();
        assert_eq!(&first[..], b"hello");
        assert_eq!(&second[..], b"world!");
    }

    #[tokio::test]
    async fn test_zero_length_message_distinct_from_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        send_message(&mut a, b"").await.unwrap();
        drop(a);

        let empty = recv_message(&mut b, 16).await.unwrap();
        assert_eq!(empty, Some(Bytes::new()));
        let eof = recv_message(&mut b, 16).await.unwrap();
        assert_eq!(eof, None);
    }

    #[tokio::test]
    async fn test_oversized_message_drained() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        let big = vec![7u8; 20_000];
        send_message(&mut a, &big).await.unwrap();
        send_message(&mut a, b"next").await.unwrap();

        let result = recv_message(&mut b, 100).await;
        assert!(matches!(
            result,
            Err(PipeError::MessageTooLarge { size: 20_000, max: 100 })
        ));

        let next = recv_message(&mut b, 100).await.unwrap().unwrap();
        assert_eq!(&next[..], b"next");
    }

    #[tokio::test]
    async fn test_eof_inside_prefix_is_reset() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0]).await.unwrap();
        drop(a);
        let result = recv_message(&mut b, 16).await;
        assert!(matches!(result, Err(PipeError::ConnectionReset)));
    }

    #[tokio::test]
    async fn test_eof_inside_payload_is_reset() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0, 0, 10, b'a', b'b']).await.unwrap();
        drop(a);
        let result = recv_message(&mut b, 16).await;
        assert!(matches!(result, Err(PipeError::ConnectionReset)));
    }

    #[tokio::test]
    async fn test_prefix_then_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);
        send_message(&mut a, b"split").await.unwrap();
        drop(a);

        let len = recv_prefix(&mut b).await.unwrap().unwrap();
        assert_eq!(len, 5);
        let payload = recv_payload(&mut b, len, 16).await.unwrap();
        assert_eq!(&payload[..], b"split");
        assert_eq!(recv_prefix(&mut b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_concatenation_in_order() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        send(PipeMode::Stream, &mut a, b"abc").await.unwrap();
        send(PipeMode::Stream, &mut a, b"def").await.unwrap();
        drop(a);

        let first = recv(PipeMode::Stream, &mut b, 1).await.unwrap().unwrap();
        assert_eq!(&first[..], b"a");

        let mut collected = first.to_vec();
        while let Some(chunk) = recv(PipeMode::Stream, &mut b, 4).await.unwrap() {
            assert!(!chunk.is_empty() && chunk.len() <= 4);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"abcdef");
    }

    #[tokio::test]
    async fn test_stream_send_is_unframed() {
        let (mut a, mut b) = tokio::io::duplex(64);
        send(PipeMode::Stream, &mut a, b"raw").await.unwrap();
        let chunk = recv_stream(&mut b, 64).await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"raw");
    }

    #[tokio::test]
    async fn test_stream_recv_zero_rejected() {
        let (_a, mut b) = tokio::io::duplex(64);
        let result = recv_stream(&mut b, 0).await;
        assert!(matches!(result, Err(PipeError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_message_mode_dispatch() {
        let (mut a, mut b) = tokio::io::duplex(64);
        send(PipeMode::Message, &mut a, b"framed").await.unwrap();
        let raw = recv_stream(&mut b, 64).await.unwrap().unwrap();
        assert_eq!(&raw[..4], &[0, 0, 0, 6]);
        assert_eq!(&raw[4..], b"framed");
    }
}
