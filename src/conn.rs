//! Per-connection endpoint state.
//!
//! A [`Connection`] is the handle applications use to push bytes toward one
//! peer: the client's sole connection, or one accepted peer on a server. It
//! holds the single-slot outbound buffer and the lock guarding it; the
//! underlying socket stays owned by the service loop that created it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::config::OverflowPolicy;
use crate::service::ServiceState;

/// One live WebSocket connection.
///
/// Cloning the `Arc` handed to callbacks is the way to keep a sending handle
/// around past the callback; the endpoint degrades to a no-op sender once the
/// connection is gone, so a stale handle can never touch freed state.
pub struct Connection {
    id: u64,
    slot: Mutex<Option<Vec<u8>>>,
    policy: OverflowPolicy,
    closed: AtomicBool,
    state: Arc<ServiceState>,
}

impl Connection {
    pub(crate) fn new(id: u64, policy: OverflowPolicy, state: Arc<ServiceState>) -> Self {
        Self {
            id,
            slot: Mutex::new(None),
            policy,
            closed: AtomicBool::new(false),
            state,
        }
    }

    /// Identifier of this connection, unique within its endpoint.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the connection is still live. A closed connection swallows
    /// all further `send`s.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Queue `payload` for transmission.
    ///
    /// The bytes are copied; the caller's buffer is never retained past this
    /// call. At most one message can be queued at a time — what happens to a
    /// `send` landing on an occupied slot is decided by the endpoint's
    /// [`OverflowPolicy`] (default: the new message is silently dropped).
    ///
    /// Never blocks on I/O and never invokes a callback; it only takes the
    /// slot lock briefly and wakes the service loop.
    pub fn send(&self, payload: &[u8]) {
        if payload.is_empty() {
            trace!(conn = self.id, "empty send ignored");
            return;
        }
        if !self.is_open() {
            trace!(conn = self.id, "send on closed connection ignored");
            return;
        }
        {
            let mut slot = self.slot.lock();
            if slot.is_some() && self.policy == OverflowPolicy::DropNew {
                trace!(
                    conn = self.id,
                    len = payload.len(),
                    "outbound slot occupied, message dropped"
                );
                return;
            }
            *slot = Some(payload.to_vec());
        }
        self.state.wake();
    }

    /// Take the pending outbound message, leaving the slot empty.
    ///
    /// Only called from the service loop when the connection can accept a
    /// write.
    pub(crate) fn take_pending(&self) -> Option<Vec<u8>> {
        self.slot.lock().take()
    }

    /// Invalidate the endpoint: later `send`s become no-ops and anything
    /// still queued is discarded.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        self.slot.lock().take();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("pending", &self.slot.lock().is_some())
            .finish()
    }
}
