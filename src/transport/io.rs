//! Primitive read/write on a connected pipe.
//!
//! These are the only points where bytes cross the OS boundary; both map
//! raw I/O errors into the pipe taxonomy so callers above never see a bare
//! `io::Error` for a vanished peer.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{PipeError, Result};

/// Upper bound on a single read buffer (64KB).
pub const MAX_READ_CHUNK: usize = 64 * 1024;

/// Read at most `max_len` bytes.
///
/// An empty result means the peer shut down in an orderly way.
pub async fn read_chunk<R>(reader: &mut R, max_len: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(max_len.min(MAX_READ_CHUNK));
    let n = reader.read(&mut buf).await.map_err(PipeError::from_io)?;
    buf.truncate(n);
    Ok(buf.freeze())
}

/// Write some prefix of `data`, returning how many bytes went out.
pub async fn write_chunk<W>(writer: &mut W, data: &[u8]) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    writer.write(data).await.map_err(PipeError::from_io)
}

/// Write all of `data`, looping over short writes.
pub async fn write_fully<W>(writer: &mut W, mut data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while !data.is_empty() {
        let n = write_chunk(writer, data).await?;
        if n == 0 {
            return Err(PipeError::BrokenPipe);
        }
        data = &data[n..];
    }
    writer.flush().await.map_err(PipeError::from_io)
}

/// Fill `buf` completely unless EOF arrives first.
///
/// Returns the number of bytes read; anything short of `buf.len()` means
/// the peer shut down.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(PipeError::from_io)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_chunk_respects_max_len() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"abcdef").await.unwrap();

        let chunk = read_chunk(&mut b, 2).await.unwrap();
        assert_eq!(&chunk[..], b"ab");
        let chunk = read_chunk(&mut b, 10).await.unwrap();
        assert_eq!(&chunk[..], b"cdef");
    }

    #[tokio::test]
    async fn test_read_chunk_eof_is_empty() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let chunk = read_chunk(&mut b, 16).await.unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn test_write_fully_through_small_buffer() {
        // duplex capacity forces several short writes
        let (mut a, mut b) = tokio::io::duplex(3);
        let data: Vec<u8> = (0..=255).collect();
        let expected = data.clone();

        let writer = tokio::spawn(async move {
            write_fully(&mut a, &data).await.unwrap();
        });

        let mut received = vec![0u8; 256];
        assert_eq!(read_full(&mut b, &mut received).await.unwrap(), 256);
        writer.await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_write_after_peer_gone() {
        let (mut a, b) = tokio::io::duplex(8);
        drop(b);
        let result = write_fully(&mut a, b"data").await;
        assert!(matches!(result, Err(PipeError::BrokenPipe)));
    }

    #[tokio::test]
    async fn test_read_full_short_on_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"xy").await.unwrap();
        drop(a);
        let mut buf = [0u8; 4];
        assert_eq!(read_full(&mut b, &mut buf).await.unwrap(), 2);
    }
}
