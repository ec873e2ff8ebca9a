//! Application-facing event callbacks.
//!
//! All callbacks run synchronously on the endpoint's service-loop thread.
//! Blocking inside a callback stalls every connection owned by that endpoint,
//! so handlers should hand work off quickly. Calling `close`/`stop` on the
//! owning handle from inside a callback deadlocks (it joins the thread the
//! callback is running on).
//!
//! The `payload` slice passed to `on_message` points into an engine-owned
//! receive buffer and is only valid for the duration of the call — copy it
//! if you need to keep it.

use std::sync::Arc;

use crate::conn::Connection;

/// Callbacks for a client endpoint.
///
/// All methods default to no-ops, so implementations only spell out the
/// events they care about.
pub trait ClientEvents: Send + 'static {
    /// The outbound handshake completed; `conn` is now live.
    fn on_open(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }

    /// A message arrived from the peer.
    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
        let _ = (conn, payload);
    }

    /// The connection is gone: the peer closed it or the transport failed
    /// after establishment. Fires at most once, after which no further
    /// events reference `conn`.
    fn on_close(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }

    /// The connect attempt failed before a connection was established.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// Callbacks for a server endpoint, shared by all accepted peers.
///
/// There is no per-peer error callback: a peer that fails mid-handshake is
/// never surfaced, and one that dies after establishment arrives as
/// `on_close`.
pub trait ServerEvents: Send + Sync + 'static {
    /// An inbound handshake completed; `conn` identifies the new peer.
    fn on_open(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }

    /// A message arrived from `conn`.
    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
        let _ = (conn, payload);
    }

    /// The peer is gone. Fires at most once per connection; no further
    /// events reference `conn` afterwards.
    fn on_close(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }
}
