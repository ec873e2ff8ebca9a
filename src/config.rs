//! Per-endpoint configuration.
//!
//! Every [`Client`](crate::Client) and [`Server`](crate::Server) owns its own
//! `Config`, handed over at construction time. Nothing here is process-wide:
//! two endpoints in the same process never share mutable configuration.

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Default bounded wait of one service-loop iteration.
pub const DEFAULT_SERVICE_SLICE: Duration = Duration::from_millis(50);

/// What `send` does when the single outbound slot is already occupied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep the queued message, silently drop the new one.
    #[default]
    DropNew,
    /// Replace the queued message with the new one (keep-latest coalescing).
    KeepLatest,
}

/// Configuration for one client or server endpoint.
#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on one blocking wait of the service loop. Shutdown and
    /// coalesced wakeups are observed within at most one slice.
    pub service_slice: Duration,
    /// Policy for `send` on an occupied outbound slot.
    pub overflow: OverflowPolicy,
    /// Maximum size of a single inbound message accepted from the peer.
    /// `None` uses the engine default.
    pub max_message_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_slice: DEFAULT_SERVICE_SLICE,
            overflow: OverflowPolicy::default(),
            max_message_size: None,
        }
    }
}

impl Config {
    /// Translate into the engine's per-connection protocol settings.
    pub(crate) fn engine_config(&self) -> Option<WebSocketConfig> {
        self.max_message_size
            .map(|limit| WebSocketConfig::default().max_message_size(Some(limit)))
    }
}
