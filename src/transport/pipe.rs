//! Platform-specific pipe/socket implementation.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! Both variants export the same surface (`PipeListener`, `PipeStream`,
//! `PipeReader`, `PipeWriter`); exactly one is compiled per target.
//! Releasing a value closes the OS resource, so "close" is simply drop.
//!
//! # Example
//!
//! ```ignore
//! use protopipe::transport::{PipeAddress, PipeListener, PipeStream};
//!
//! let address = PipeAddress::resolve("chan", &Default::default())?;
//! let listener = PipeListener::bind(&address).await?;
//! let peer = PipeStream::connect(&address).await?;
//! let accepted = listener.accept().await?;
//! ```

use std::io;

use super::address::PipeAddress;
use crate::error::PipeError;

/// Map an error from creating a listener.
fn bind_error(address: &PipeAddress, err: io::Error) -> PipeError {
    match err.kind() {
        io::ErrorKind::AddrInUse => PipeError::AddressInUse(address.to_string()),
        io::ErrorKind::PermissionDenied => PipeError::PermissionDenied(address.to_string()),
        _ => PipeError::Io(err),
    }
}

/// Map an error from connecting to a listener.
fn connect_error(address: &PipeAddress, err: io::Error) -> PipeError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
            PipeError::NotFound(address.to_string())
        }
        io::ErrorKind::PermissionDenied => PipeError::PermissionDenied(address.to_string()),
        _ => PipeError::Io(err),
    }
}

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::os::unix::fs::FileTypeExt;
    use std::path::Path;

    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::{UnixListener, UnixStream};

    use crate::error::Result;

    /// Read half of a connected pipe.
    pub type PipeReader = OwnedReadHalf;

    /// Write half of a connected pipe.
    pub type PipeWriter = OwnedWriteHalf;

    /// Unix Domain Socket listener.
    ///
    /// Owns the socket file: it is unlinked when the listener is dropped.
    pub struct PipeListener {
        listener: UnixListener,
        address: PipeAddress,
    }

    /// Unix Domain Socket stream (connected).
    pub struct PipeStream {
        stream: UnixStream,
    }

    impl PipeListener {
        /// Bind to the socket path of `address`.
        ///
        /// A socket file left behind by a dead listener is unlinked and the
        /// bind retried once. A live listener yields `AddressInUse`.
        pub async fn bind(address: &PipeAddress) -> Result<Self> {
            let path = address.path();
            let listener = match UnixListener::bind(path) {
                Ok(listener) => listener,
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    if !Self::is_stale(path).await {
                        return Err(PipeError::AddressInUse(address.to_string()));
                    }
                    tracing::warn!(path = %address, "Reclaiming stale socket file");
                    std::fs::remove_file(path).map_err(|e| bind_error(address, e))?;
                    UnixListener::bind(path).map_err(|e| bind_error(address, e))?
                }
                Err(e) => return Err(bind_error(address, e)),
            };

            tracing::debug!(path = %address, "Pipe listener bound");
            Ok(Self {
                listener,
                address: address.clone(),
            })
        }

        /// A socket file nobody accepts on. Non-socket files are never stale.
        async fn is_stale(path: &Path) -> bool {
            let is_socket = std::fs::symlink_metadata(path)
                .map(|meta| meta.file_type().is_socket())
                .unwrap_or(false);
            if !is_socket {
                return false;
            }
            matches!(
                UnixStream::connect(path).await,
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused
            )
        }

        /// Accept a single connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let (stream, _addr) = self.listener.accept().await.map_err(PipeError::from_io)?;
            tracing::debug!(path = %self.address, "Accepted pipe peer");
            Ok(PipeStream { stream })
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            // Clean up socket file when listener is dropped
            let _ = std::fs::remove_file(self.address.path());
        }
    }

    impl PipeStream {
        /// Connect to the listener at `address`.
        pub async fn connect(address: &PipeAddress) -> Result<Self> {
            let stream = UnixStream::connect(address.path())
                .await
                .map_err(|e| connect_error(address, e))?;
            tracing::debug!(path = %address, "Connected to pipe");
            Ok(Self { stream })
        }

        /// Split into independently owned read and write halves.
        pub fn into_split(self) -> (PipeReader, PipeWriter) {
            self.stream.into_split()
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };
    use tokio::sync::Mutex;

    use crate::error::Result;

    /// All server instances are connected; a listener exists, so wait.
    const ERROR_PIPE_BUSY: i32 = 231;

    const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(50);

    /// Read half of a connected pipe.
    pub type PipeReader = ReadHalf<PipeStream>;

    /// Write half of a connected pipe.
    pub type PipeWriter = WriteHalf<PipeStream>;

    /// Windows Named Pipe listener.
    ///
    /// Always holds one unconnected server instance so the next client can
    /// open the pipe.
    pub struct PipeListener {
        pending: Mutex<NamedPipeServer>,
        address: PipeAddress,
    }

    /// Windows Named Pipe stream (connected).
    pub enum PipeStream {
        Server(NamedPipeServer),
        Client(NamedPipeClient),
    }

    impl PipeListener {
        /// Create the first pipe instance.
        ///
        /// Windows reports an existing pipe of the same name as access
        /// denied, which maps to `AddressInUse` here.
        pub async fn bind(address: &PipeAddress) -> Result<Self> {
            let server = ServerOptions::new()
                .first_pipe_instance(true)
                .create(address.pipe_name())
                .map_err(|e| match e.kind() {
                    io::ErrorKind::PermissionDenied => {
                        PipeError::AddressInUse(address.to_string())
                    }
                    _ => bind_error(address, e),
                })?;

            tracing::debug!(pipe = %address, "Pipe listener created");
            Ok(Self {
                pending: Mutex::new(server),
                address: address.clone(),
            })
        }

        /// Accept a single connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let mut pending = self.pending.lock().await;
            pending.connect().await.map_err(PipeError::from_io)?;

            let next = ServerOptions::new()
                .create(self.address.pipe_name())
                .map_err(PipeError::Io)?;
            let connected = std::mem::replace(&mut *pending, next);

            tracing::debug!(pipe = %self.address, "Accepted pipe peer");
            Ok(PipeStream::Server(connected))
        }
    }

    impl PipeStream {
        /// Open the named pipe at `address`.
        pub async fn connect(address: &PipeAddress) -> Result<Self> {
            loop {
                match ClientOptions::new().open(address.pipe_name()) {
                    Ok(client) => {
                        tracing::debug!(pipe = %address, "Connected to pipe");
                        return Ok(PipeStream::Client(client));
                    }
                    Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                    Err(e) => return Err(connect_error(address, e)),
                }
                tokio::time::sleep(BUSY_RETRY_INTERVAL).await;
            }
        }

        /// Split into read and write halves.
        pub fn into_split(self) -> (PipeReader, PipeWriter) {
            tokio::io::split(self)
        }
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.get_mut() {
                PipeStream::Server(pipe) => Pin::new(pipe).poll_read(cx, buf),
                PipeStream::Client(pipe) => Pin::new(pipe).poll_read(cx, buf),
            }
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match self.get_mut() {
                PipeStream::Server(pipe) => Pin::new(pipe).poll_write(cx, buf),
                PipeStream::Client(pipe) => Pin::new(pipe).poll_write(cx, buf),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                PipeStream::Server(pipe) => Pin::new(pipe).poll_flush(cx),
                PipeStream::Client(pipe) => Pin::new(pipe).poll_flush(cx),
            }
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                PipeStream::Server(pipe) => Pin::new(pipe).poll_shutdown(cx),
                PipeStream::Client(pipe) => Pin::new(pipe).poll_shutdown(cx),
            }
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::{PipeListener, PipeReader, PipeStream, PipeWriter};

#[cfg(windows)]
pub use windows_impl::{PipeListener, PipeReader, PipeStream, PipeWriter};

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> PipeAddress {
        PipeAddress::resolve("mapping", &Default::default()).unwrap()
    }

    #[test]
    fn test_bind_error_mapping() {
        let address = address();
        assert!(matches!(
            bind_error(&address, io::Error::from(io::ErrorKind::AddrInUse)),
            PipeError::AddressInUse(_)
        ));
        assert!(matches!(
            bind_error(&address, io::Error::from(io::ErrorKind::PermissionDenied)),
            PipeError::PermissionDenied(_)
        ));
        assert!(matches!(
            bind_error(&address, io::Error::from(io::ErrorKind::Other)),
            PipeError::Io(_)
        ));
    }

    #[test]
    fn test_connect_error_mapping() {
        let address = address();
        assert!(matches!(
            connect_error(&address, io::Error::from(io::ErrorKind::NotFound)),
            PipeError::NotFound(_)
        ));
        assert!(matches!(
            connect_error(&address, io::Error::from(io::ErrorKind::ConnectionRefused)),
            PipeError::NotFound(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_accept_connect() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let config = crate::PipeConfig {
            socket_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let address = PipeAddress::resolve("roundtrip", &config).unwrap();

        let listener = PipeListener::bind(&address).await.unwrap();
        assert!(address.path().exists());

        let client = PipeStream::connect(&address).await.unwrap();
        let server = listener.accept().await.unwrap();

        let (_client_rx, mut client_tx) = client.into_split();
        let (mut server_rx, _server_tx) = server.into_split();
        client_tx.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        server_rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(listener);
        assert!(!address.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_refuses_non_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::PipeConfig {
            socket_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let address = PipeAddress::resolve("regular", &config).unwrap();
        std::fs::write(address.path(), b"not a socket").unwrap();

        let result = PipeListener::bind(&address).await;
        assert!(matches!(result, Err(PipeError::AddressInUse(_))));
        assert!(address.path().exists());
    }
}
