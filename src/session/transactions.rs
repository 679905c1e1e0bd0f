//! Pending-transaction registry.
//!
//! Correlates asynchronous replies with the request that triggered them.
//! Every in-flight request owns one entry, keyed by its transaction
//! identifier; the entry holds the `oneshot` sender the caller is
//! awaiting. Replies may arrive in any order relative to the order
//! requests were sent; correlation is by identifier, never by position.
//!
//! A transaction settles exactly once: by a matching reply (success or
//! gateway error), by the caller's timeout, or by session teardown.
//! Whichever comes first wins; the loser finds no entry and is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::TransactionId;
use crate::protocol::IncomingMessage;

// ============================================================================
// Types
// ============================================================================

/// One in-flight request awaiting its reply.
struct Pending {
    /// Fulfillment channel the caller is awaiting.
    reply_tx: oneshot::Sender<Result<IncomingMessage>>,
    /// Registration time, for diagnostics.
    registered_at: Instant,
}

type PendingMap = FxHashMap<TransactionId, Pending>;

// ============================================================================
// TransactionRegistry
// ============================================================================

/// Tracks in-flight requests awaiting a reply.
///
/// Cheap to clone; clones share the same underlying map. The session
/// facade registers from caller tasks, the event loop resolves; the
/// map's lock is the only synchronization either side needs.
#[derive(Clone, Default)]
pub(crate) struct TransactionRegistry {
    pending: Arc<Mutex<PendingMap>>,
}

impl TransactionRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new transaction and returns its reply channel.
    ///
    /// With `explicit: None` an identifier is generated; generation
    /// retries under the map lock until the id is absent, so uniqueness
    /// among pending transactions is guaranteed structurally rather than
    /// probabilistically. A caller-supplied id that is already pending
    /// is a usage error.
    pub(crate) fn register(
        &self,
        explicit: Option<TransactionId>,
    ) -> Result<(TransactionId, oneshot::Receiver<Result<IncomingMessage>>)> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let mut pending = self.pending.lock();

        let id = match explicit {
            Some(id) => {
                if pending.contains_key(&id) {
                    return Err(Error::usage(format!(
                        "transaction {id} is already pending"
                    )));
                }
                id
            }
            None => {
                let mut id = TransactionId::generate();
                while pending.contains_key(&id) {
                    id = TransactionId::generate();
                }
                id
            }
        };

        pending.insert(
            id.clone(),
            Pending {
                reply_tx,
                registered_at: Instant::now(),
            },
        );

        Ok((id, reply_rx))
    }

    /// Settles the pending transaction `id` with `message`.
    ///
    /// An `error` reply rejects the caller with [`Error::Protocol`];
    /// anything else fulfills it. Returns `None` once settled. If no
    /// such transaction is pending (a duplicate or late reply), the
    /// message is handed back untouched so the dispatch path can
    /// continue classifying it.
    pub(crate) fn resolve(
        &self,
        id: &TransactionId,
        message: IncomingMessage,
    ) -> Option<IncomingMessage> {
        let entry = self.pending.lock().remove(id);

        match entry {
            Some(pending) => {
                trace!(
                    transaction = %id,
                    elapsed_ms = pending.registered_at.elapsed().as_millis() as u64,
                    "transaction settled"
                );
                let _ = pending.reply_tx.send(message.into_result());
                None
            }
            None => {
                trace!(transaction = %id, "no pending transaction for reply");
                Some(message)
            }
        }
    }

    /// Rejects the pending transaction `id` with `error`.
    ///
    /// Used when the write for the request failed after registration.
    /// A no-op if the transaction already settled.
    pub(crate) fn fail(&self, id: &TransactionId, error: Error) {
        if let Some(pending) = self.pending.lock().remove(id) {
            let _ = pending.reply_tx.send(Err(error));
        }
    }

    /// Removes the pending transaction `id` without notifying the caller.
    ///
    /// Used for timeout cleanup, where the caller already gave up; a
    /// reply arriving later finds nothing and is dropped.
    pub(crate) fn discard(&self, id: &TransactionId) {
        if self.pending.lock().remove(id).is_some() {
            trace!(transaction = %id, "pending transaction discarded");
        }
    }

    /// Rejects every pending transaction with [`Error::ConnectionClosed`].
    ///
    /// Called once on session teardown; the drain happens under a single
    /// lock acquisition, so no new registration can interleave with the
    /// bulk rejection.
    pub(crate) fn fail_all(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (_, pending) in drained {
            let _ = pending.reply_tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "rejected pending transactions on teardown");
        }
    }

    /// Returns the number of in-flight transactions.
    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
