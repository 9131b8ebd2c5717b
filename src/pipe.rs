//! Pipe handle and builder.
//!
//! A [`Pipe`] owns at most one transport connection and a fixed
//! [`PipeMode`]. Its lifecycle:
//! 1. `new(mode)` - Unbound
//! 2. `listen(name)` - Listening (STREAM) or Connected (MESSAGE)
//!    or `connect(name)` - Connected
//! 3. `accept()` - Connected (STREAM listeners only)
//! 4. `send` / `recv` while Connected
//! 5. `close()` - Closed, from any state
//!
//! All methods block the calling thread. I/O is driven on that thread by a
//! private current-thread tokio runtime, so no background threads exist.
//! `close()` from another thread makes any blocked call on the same handle
//! fail with [`PipeError::Closed`].
//!
//! # Example
//!
//! ```no_run
//! use protopipe::{Pipe, PipeMode};
//!
//! # fn main() -> protopipe::Result<()> {
//! let server = Pipe::new(PipeMode::Message)?;
//! server.listen("chan1")?;
//!
//! let client = Pipe::new(PipeMode::Message)?;
//! client.connect("chan1")?;
//! client.send(b"hello")?;
//!
//! let message = server.recv(1024)?;
//! assert_eq!(message.as_deref(), Some(&b"hello"[..]));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::codec::Codec;
use crate::config::PipeConfig;
use crate::error::{PipeError, Result};
use crate::peers::{PeerSet, ReadyPeer};
use crate::protocol::{framing, PipeMode};
use crate::transport::{PipeAddress, PipeListener, PipeReader, PipeStream, PipeWriter};

/// Connection state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Freshly created, no endpoint yet.
    Unbound,
    /// STREAM listener waiting for `accept()`.
    Listening,
    /// Ready for `send`/`recv`.
    Connected,
    /// Terminal.
    Closed,
}

/// Which side of the rendezvous this handle took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Listener,
    Initiator,
}

struct Inner {
    state: PipeState,
    role: Option<Role>,
    address: Option<PipeAddress>,
    listener: Option<Arc<PipeListener>>,
}

/// Builder for a [`Pipe`] with a non-default namespace.
///
/// Both sides of a connection must use the same namespace settings.
pub struct PipeBuilder {
    mode: PipeMode,
    config: PipeConfig,
}

impl PipeBuilder {
    /// Create a builder for a pipe of the given mode.
    pub fn new(mode: PipeMode) -> Self {
        Self {
            mode,
            config: PipeConfig::default(),
        }
    }

    /// Directory holding socket files for relative names (Unix).
    ///
    /// Default: `/tmp` (`/data/local/tmp` on Android)
    pub fn socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.socket_dir = dir.into();
        self
    }

    /// Prefix for named-pipe identifiers (Windows).
    ///
    /// Default: `protopipe-`
    pub fn pipe_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.pipe_prefix = prefix.into();
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the handle in the Unbound state.
    pub fn build(self) -> Result<Pipe> {
        Pipe::with_config(self.mode, self.config)
    }
}

/// A local IPC pipe handle.
///
/// `Pipe` is `Send + Sync`; share it through an `Arc` to close it from
/// another thread or to run the send and recv directions on separate
/// threads. Calls in the same direction are serialized. Do not call its
/// methods from inside an async runtime.
pub struct Pipe {
    mode: PipeMode,
    config: PipeConfig,
    runtime: Runtime,
    inner: Mutex<Inner>,
    reader: AsyncMutex<Option<PipeReader>>,
    writer: AsyncMutex<Option<PipeWriter>>,
    peers: AsyncMutex<PeerSet>,
    closed: watch::Sender<bool>,
}

impl Pipe {
    /// Create an Unbound handle with the default namespace.
    pub fn new(mode: PipeMode) -> Result<Self> {
        Self::with_config(mode, PipeConfig::default())
    }

    /// Create a builder for a customized handle.
    pub fn builder(mode: PipeMode) -> PipeBuilder {
        PipeBuilder::new(mode)
    }

    /// Create an Unbound handle with an explicit configuration.
    pub fn with_config(mode: PipeMode, config: PipeConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (closed, _) = watch::channel(false);

        Ok(Self {
            mode,
            config,
            runtime,
            inner: Mutex::new(Inner {
                state: PipeState::Unbound,
                role: None,
                address: None,
                listener: None,
            }),
            reader: AsyncMutex::new(None),
            writer: AsyncMutex::new(None),
            peers: AsyncMutex::new(PeerSet::default()),
            closed,
        })
    }

    /// The mode fixed at construction.
    pub fn mode(&self) -> PipeMode {
        self.mode
    }

    /// Current connection state.
    pub fn state(&self) -> PipeState {
        self.inner.lock().state
    }

    /// Logical name passed to `listen`/`connect`, if any.
    pub fn name(&self) -> Option<String> {
        self.inner
            .lock()
            .address
            .as_ref()
            .map(|address| address.name().to_string())
    }

    /// Resolved endpoint, if any.
    pub fn address(&self) -> Option<PipeAddress> {
        self.inner.lock().address.clone()
    }

    /// True if this handle created the endpoint.
    pub fn is_listener(&self) -> bool {
        self.inner.lock().role == Some(Role::Listener)
    }

    /// The namespace configuration.
    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Create the endpoint `name` and wait there for peers.
    ///
    /// A MESSAGE handle is Connected immediately and accepts peers
    /// implicitly inside `recv`. A STREAM handle becomes Listening and
    /// needs `accept()`.
    pub fn listen(&self, name: &str) -> Result<()> {
        let address = PipeAddress::resolve(name, &self.config)?;
        self.expect_state(PipeState::Unbound, "listen")?;

        let listener = self.run(PipeListener::bind(&address))?;

        let mut inner = self.inner.lock();
        if inner.state != PipeState::Unbound {
            return Err(Self::lost_race(inner.state, "listen"));
        }
        inner.state = match self.mode {
            PipeMode::Message => PipeState::Connected,
            PipeMode::Stream => PipeState::Listening,
        };
        inner.role = Some(Role::Listener);
        inner.address = Some(address);
        inner.listener = Some(Arc::new(listener));

        tracing::debug!(mode = %self.mode, name, "Pipe listening");
        Ok(())
    }

    /// Wait for a peer on a STREAM listener.
    ///
    /// Only one peer is held at a time; after it disconnects the handle
    /// returns to Listening and `accept()` may be called again.
    pub fn accept(&self) -> Result<()> {
        if self.mode == PipeMode::Message {
            return Err(PipeError::InvalidOperation(
                "MESSAGE pipes accept peers implicitly; accept() is STREAM only".to_string(),
            ));
        }

        let listener = {
            let inner = self.inner.lock();
            if inner.state != PipeState::Listening {
                return Err(PipeError::InvalidOperation(format!(
                    "cannot accept while {:?}",
                    inner.state
                )));
            }
            inner.listener.clone().ok_or(PipeError::NotConnected)?
        };

        self.run(async {
            let stream = listener.accept().await?;
            self.attach(stream).await;
            Ok(())
        })?;
        drop(listener);

        self.finish_attach(PipeState::Listening, "accept")?;
        tracing::debug!("Stream peer accepted");
        Ok(())
    }

    /// Connect to the listener at `name`.
    ///
    /// Fails with `NotFound` if nobody listens there; retrying is up to
    /// the caller.
    pub fn connect(&self, name: &str) -> Result<()> {
        let address = PipeAddress::resolve(name, &self.config)?;
        self.expect_state(PipeState::Unbound, "connect")?;

        self.run(async {
            let stream = PipeStream::connect(&address).await?;
            self.attach(stream).await;
            Ok(())
        })?;

        let mut inner = self.finish_attach(PipeState::Unbound, "connect")?;
        inner.role = Some(Role::Initiator);
        inner.address = Some(address);
        drop(inner);

        tracing::debug!(mode = %self.mode, name, "Pipe connected");
        Ok(())
    }

    /// Send `data` to the peer.
    ///
    /// MESSAGE: delivered as one whole message. STREAM: every byte is
    /// written before returning.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let role = self.expect_connected()?;
        let result = self.run(async {
            let mut writer = self.writer.lock().await;
            let writer = writer.as_mut().ok_or(PipeError::NotConnected)?;
            framing::send(self.mode, writer, data).await
        });

        if let Err(e) = &result {
            if e.is_disconnect() {
                self.peer_lost(role);
            }
        }
        result
    }

    /// Receive from the peer.
    ///
    /// Returns `Ok(None)` when the peer shut down in an orderly way. An
    /// initiator is then Closed; a STREAM listener returns to Listening. A
    /// reset peer has the same effect but is reported as the error.
    ///
    /// A MESSAGE listener serves every connected peer at once and returns
    /// the first whole message from any of them. It never reports peer
    /// shutdown; departed peers are dropped silently. `send` then replies to
    /// the peer the message came from.
    ///
    /// MESSAGE: one whole message of at most `max_len` bytes; larger messages
    /// are discarded with `MessageTooLarge`. STREAM: between 1 and `max_len`
    /// bytes.
    pub fn recv(&self, max_len: usize) -> Result<Option<Bytes>> {
        let role = self.expect_connected()?;

        if role == Role::Listener && self.mode == PipeMode::Message {
            return self.run(self.recv_from_any_peer(max_len));
        }

        let received = self.run(async {
            let mut reader = self.reader.lock().await;
            let reader = reader.as_mut().ok_or(PipeError::NotConnected)?;
            framing::recv(self.mode, reader, max_len).await
        });

        match received {
            Ok(None) => self.peer_shutdown(role),
            Err(ref e) if e.is_disconnect() => self.peer_shutdown(role),
            _ => {}
        }
        received
    }

    /// Encode `value` with codec `C` and send it as one message.
    pub fn send_encoded<C: Codec, T: Serialize>(&self, value: &T) -> Result<()> {
        self.expect_message_mode("send_encoded")?;
        let payload = C::encode(value)?;
        self.send(&payload)
    }

    /// Receive one message and decode it with codec `C`.
    pub fn recv_decoded<C: Codec, T: DeserializeOwned>(&self, max_len: usize) -> Result<Option<T>> {
        self.expect_message_mode("recv_decoded")?;
        match self.recv(max_len)? {
            Some(payload) => C::decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Close the handle and release its resources.
    ///
    /// Idempotent. Blocked calls on other threads fail with `Closed`.
    pub fn close(&self) {
        let listener = {
            let mut inner = self.inner.lock();
            if inner.state == PipeState::Closed {
                return;
            }
            inner.state = PipeState::Closed;
            inner.listener.take()
        };

        self.closed.send_replace(true);
        drop(listener);
        self.release();
        tracing::debug!(mode = %self.mode, "Pipe closed");
    }

    /// Drive `op` on this thread until it finishes or the handle closes.
    fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut closed = self.closed.subscribe();
        let result = self.runtime.block_on(async move {
            tokio::select! {
                biased;
                _ = closed.wait_for(|closed| *closed) => Err(PipeError::Closed),
                result = op => result,
            }
        });

        if matches!(result, Err(PipeError::Closed)) {
            // the cancelled call may have held a connection half
            self.release();
        }
        result
    }

    /// MESSAGE listener receive: accept new peers and read from all of them.
    async fn recv_from_any_peer(&self, max_len: usize) -> Result<Option<Bytes>> {
        let listener = self
            .inner
            .lock()
            .listener
            .clone()
            .ok_or(PipeError::NotConnected)?;
        let mut peers = self.peers.lock().await;

        loop {
            let ReadyPeer { id, mut reader, header } = tokio::select! {
                accepted = listener.accept() => {
                    let (reader, writer) = accepted?.into_split();
                    let id = peers.add(reader, writer);
                    tracing::debug!(peer = id, peers = peers.len(), "Message peer attached");
                    continue;
                }
                Some(ready) = peers.next_ready(), if !peers.is_empty() => ready,
            };

            let len = match header {
                Ok(Some(len)) => len,
                Ok(None) => {
                    tracing::debug!(peer = id, "Message peer detached");
                    peers.forget(id, &mut *self.writer.lock().await);
                    continue;
                }
                Err(e) => {
                    tracing::debug!(peer = id, error = %e, "Message peer dropped");
                    peers.forget(id, &mut *self.writer.lock().await);
                    continue;
                }
            };

            match framing::recv_payload(&mut reader, len, max_len).await {
                Ok(message) => {
                    peers.watch(id, reader);
                    peers.route_replies(id, &mut *self.writer.lock().await);
                    return Ok(Some(message));
                }
                Err(e @ PipeError::MessageTooLarge { .. }) => {
                    peers.watch(id, reader);
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(peer = id, error = %e, "Message peer dropped");
                    peers.forget(id, &mut *self.writer.lock().await);
                }
            }
        }
    }

    async fn attach(&self, stream: PipeStream) {
        let (reader, writer) = stream.into_split();
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
    }

    /// Move to Connected after a successful accept/connect, unless the
    /// handle left `expected` meanwhile.
    fn finish_attach(&self, expected: PipeState, op: &str) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock();
        if inner.state != expected {
            let state = inner.state;
            drop(inner);
            self.release_connection();
            return Err(Self::lost_race(state, op));
        }
        inner.state = PipeState::Connected;
        Ok(inner)
    }

    /// A send found the peer gone.
    fn peer_lost(&self, role: Role) {
        if role == Role::Listener && self.mode == PipeMode::Message {
            // only the reply route is dead; other peers stay attached
            if let Ok(mut writer) = self.writer.try_lock() {
                writer.take();
            }
            return;
        }
        self.peer_shutdown(role);
    }

    fn peer_shutdown(&self, role: Role) {
        match role {
            Role::Initiator => {
                tracing::debug!(mode = %self.mode, "Peer shut down");
                self.close();
            }
            Role::Listener => {
                let mut inner = self.inner.lock();
                if inner.state != PipeState::Connected {
                    return;
                }
                inner.state = PipeState::Listening;
                drop(inner);
                self.release_connection();
                tracing::debug!("Stream peer disconnected, listening again");
            }
        }
    }

    /// Drop whatever connection halves are not in use right now.
    fn release_connection(&self) {
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut peers) = self.peers.try_lock() {
            peers.clear();
        }
    }

    fn release(&self) {
        self.release_connection();
        let mut inner = self.inner.lock();
        if inner.state == PipeState::Closed {
            inner.listener.take();
        }
    }

    fn expect_state(&self, expected: PipeState, op: &str) -> Result<()> {
        let state = self.inner.lock().state;
        if state != expected {
            return Err(PipeError::InvalidOperation(format!(
                "cannot {op} while {state:?}"
            )));
        }
        Ok(())
    }

    fn expect_connected(&self) -> Result<Role> {
        let inner = self.inner.lock();
        match (inner.state, inner.role) {
            (PipeState::Connected, Some(role)) => Ok(role),
            _ => Err(PipeError::NotConnected),
        }
    }

    fn expect_message_mode(&self, op: &str) -> Result<()> {
        if self.mode != PipeMode::Message {
            return Err(PipeError::InvalidOperation(format!(
                "{op} needs message boundaries; this is a STREAM pipe"
            )));
        }
        Ok(())
    }

    fn lost_race(state: PipeState, op: &str) -> PipeError {
        if state == PipeState::Closed {
            PipeError::Closed
        } else {
            PipeError::InvalidOperation(format!("cannot {op} while {state:?}"))
        }
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pipe")
            .field("mode", &self.mode)
            .field("state", &inner.state)
            .field("role", &inner.role)
            .field("address", &inner.address)
            .finish()
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        self.close();
    }
}
