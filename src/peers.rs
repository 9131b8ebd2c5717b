//! Connected peers of a MESSAGE listener.
//!
//! Each peer has one pending future reading its next length prefix. The
//! futures live across `recv` calls, so a prefix read halfway is never lost
//! when a call returns with another peer's message.

use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use crate::error::Result;
use crate::protocol::framing;
use crate::transport::{PipeReader, PipeWriter};

pub(crate) type PeerId = u64;

/// A peer whose next prefix arrived, or whose connection ended.
pub(crate) struct ReadyPeer {
    pub id: PeerId,
    pub reader: PipeReader,
    pub header: Result<Option<u32>>,
}

/// Accepted peers and the reply route.
///
/// The write half of the peer that sent the last message lives in the
/// handle's writer slot, so `send` never waits on this set.
#[derive(Default)]
pub(crate) struct PeerSet {
    next_id: PeerId,
    pending: FuturesUnordered<BoxFuture<'static, ReadyPeer>>,
    writers: HashMap<PeerId, PipeWriter>,
    reply_to: Option<PeerId>,
}

impl PeerSet {
    /// Register a freshly accepted peer.
    pub fn add(&mut self, reader: PipeReader, writer: PipeWriter) -> PeerId {
        let id = self.next_id;
        self.next_id += 1;
        self.writers.insert(id, writer);
        self.watch(id, reader);
        id
    }

    /// Wait for the next prefix from `reader`.
    pub fn watch(&mut self, id: PeerId, mut reader: PipeReader) {
        self.pending.push(
            async move {
                let header = framing::recv_prefix(&mut reader).await;
                ReadyPeer { id, reader, header }
            }
            .boxed(),
        );
    }

    /// Next peer with a prefix (or an ended connection); `None` when no peer is attached.
    pub async fn next_ready(&mut self) -> Option<ReadyPeer> {
        self.pending.next().await
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Route replies to `id`, parking the previous target's writer.
    pub fn route_replies(&mut self, id: PeerId, slot: &mut Option<PipeWriter>) {
        if self.reply_to == Some(id) && slot.is_some() {
            return;
        }
        if let (Some(previous), Some(writer)) = (self.reply_to, slot.take()) {
            self.writers.insert(previous, writer);
        }
        *slot = self.writers.remove(&id);
        self.reply_to = slot.as_ref().map(|_| id);
    }

    /// Drop everything held for `id`.
    pub fn forget(&mut self, id: PeerId, slot: &mut Option<PipeWriter>) {
        self.writers.remove(&id);
        if self.reply_to == Some(id) {
            slot.take();
            self.reply_to = None;
        }
    }

    /// Number of attached peers.
    pub fn len(&self) -> usize {
        self.writers.len() + usize::from(self.reply_to.is_some())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
