//! The service loop shared by both roles.
//!
//! Each endpoint runs exactly one dedicated worker thread. The thread drives
//! a current-thread tokio runtime whose only job is to pump the WebSocket
//! engine: wait (for at most one service slice) for inbound traffic or a
//! wakeup, flush the single-slot outbound buffer, and translate engine
//! events into the callback surface. All callbacks fire synchronously on
//! this thread.
//!
//! Wakeups are delivered through a [`Notify`] shared by the whole endpoint,
//! the equivalent of a cross-thread cancel of the engine's blocking wait.
//! Correctness does not depend on a wakeup being seen immediately: the
//! pending slot and the run flag are re-checked at the top of every
//! iteration, so a coalesced or lost wakeup delays a flush (or shutdown) by
//! at most one slice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::conn::Connection;

/// Run flag and wake primitive shared between an endpoint's control facade
/// and its service loop.
pub(crate) struct ServiceState {
    running: AtomicBool,
    wake: Notify,
}

impl ServiceState {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            wake: Notify::new(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Interrupt the service loop's current blocking wait.
    pub(crate) fn wake(&self) {
        self.wake.notify_waiters();
    }

    /// Order the service loop to exit, waking it so the final iteration does
    /// not sit out the rest of its slice.
    pub(crate) fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_waiters();
    }

    pub(crate) async fn notified(&self) {
        self.wake.notified().await;
    }
}

/// Why a connection's drive loop ended.
pub(crate) enum Exit {
    /// The peer closed the connection or the transport failed.
    Peer,
    /// The endpoint is shutting down; no close upcall follows.
    Stopped,
}

/// Pump one established connection until it dies or the endpoint stops.
///
/// Inbound text and binary messages both surface their payload bytes through
/// `on_message`; ping/pong and raw frames are the engine's bookkeeping and
/// are acknowledged without side effects. One pending outbound message is
/// flushed per iteration, preserving the one-write-per-writable rhythm.
pub(crate) async fn drive<S, F>(
    ws: &mut WebSocketStream<S>,
    state: &ServiceState,
    conn: &Connection,
    slice: Duration,
    mut on_message: F,
) -> Exit
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&[u8]),
{
    loop {
        if !state.is_running() {
            return Exit::Stopped;
        }
        if let Some(payload) = conn.take_pending() {
            trace!(conn = conn.id(), len = payload.len(), "flushing outbound");
            if let Err(e) = ws.send(Message::Binary(payload.into())).await {
                debug!(conn = conn.id(), error = %e, "outbound write failed");
                return Exit::Peer;
            }
        }
        tokio::select! {
            event = ws.next() => match event {
                Some(Ok(Message::Binary(data))) => on_message(&data),
                Some(Ok(Message::Text(text))) => on_message(text.as_bytes()),
                Some(Ok(Message::Close(_))) | None => return Exit::Peer,
                Some(Ok(_)) => {} // ping/pong/raw frame: nothing to do
                Some(Err(e)) => {
                    debug!(conn = conn.id(), error = %e, "transport error");
                    return Exit::Peer;
                }
            },
            _ = state.notified() => {}
            _ = tokio::time::sleep(slice) => {}
        }
    }
}

/// Best-effort bounded close handshake on the way out.
pub(crate) async fn close_quietly<S>(ws: &mut WebSocketStream<S>, slice: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _ = tokio::time::timeout(slice, ws.close(None)).await;
}

/// Resolve once the endpoint has been ordered to stop.
pub(crate) async fn stopped(state: &ServiceState, slice: Duration) {
    while state.is_running() {
        tokio::select! {
            _ = state.notified() => {}
            _ = tokio::time::sleep(slice) => {}
        }
    }
}
