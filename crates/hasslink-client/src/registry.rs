//! Subscription registry:
//! - `token -> (kind, queue sender)`
//! - fan-out: one inbound envelope is cloned into every queue whose kind
//!   matches, in iteration order, without blocking on slow consumers.
//!
//! Consumers never touch the table directly; they hold a [`Subscription`]
//! guard that releases its tokens on drop, so every exit path (return,
//! error, cancellation) tears the entries down.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use hasslink_core::protocol::envelope::{Envelope, MessageKind};

struct SubEntry {
    kind: MessageKind,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Shared, concurrency-safe subscriber table.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: DashMap<Uuid, SubEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register interest in a set of kinds.
    ///
    /// One token is minted per distinct kind; all tokens feed a single
    /// queue, so the returned guard reads a merged stream.
    pub fn acquire(self: &Arc<Self>, kinds: &[MessageKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tokens = Vec::with_capacity(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                continue;
            }
            let token = Uuid::new_v4();
            self.entries.insert(
                token,
                SubEntry {
                    kind: *kind,
                    tx: tx.clone(),
                },
            );
            tokens.push(token);
        }
        Subscription {
            tokens,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Deliver one envelope to every matching queue. Returns the number of
    /// queues it reached. Envelopes without a routing kind are dropped.
    pub fn publish(&self, env: &Envelope) -> usize {
        let Some(kind) = env.kind() else {
            return 0;
        };
        let mut delivered = 0;
        for entry in self.entries.iter() {
            if entry.kind == kind && entry.tx.send(env.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live tokens (test/diagnostic aid).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn release(&self, tokens: &[Uuid]) {
        for token in tokens {
            self.entries.remove(token);
        }
    }
}

/// RAII handle over a set of registry tokens and their shared queue.
pub struct Subscription {
    tokens: Vec<Uuid>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    /// Next envelope off the merged queue. `None` once the registry side is
    /// gone (all senders dropped after release).
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Non-blocking read, used by tests and drain paths.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    pub fn tokens(&self) -> &[Uuid] {
        &self.tokens
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(&self.tokens);
    }
}
