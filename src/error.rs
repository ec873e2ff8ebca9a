//! Errors surfaced synchronously from endpoint construction.
//!
//! Everything that can go wrong after a handle exists is reported through the
//! event callbacks instead: a failed connect attempt arrives as
//! [`ClientEvents::on_error`](crate::ClientEvents::on_error), and a dead peer
//! arrives as `on_close`. A `send` racing an occupied outbound slot is dropped
//! silently by design and never produces an error at all.

use std::io;

/// Error constructing a [`Client`](crate::Client) or [`Server`](crate::Server).
///
/// When construction fails, no worker thread has been started and no
/// callbacks will ever fire.
#[derive(Debug)]
pub enum SetupError {
    /// The connect target string does not match
    /// `("ws"|"wss") "://" host [":" port] ["/" path]`.
    InvalidTarget(String),
    /// The underlying context could not be created: binding the listener,
    /// building the runtime, or spawning the worker thread failed.
    Io(io::Error),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::InvalidTarget(reason) => write!(f, "invalid target: {reason}"),
            SetupError::Io(e) => write!(f, "context creation failed: {e}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::InvalidTarget(_) => None,
            SetupError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for SetupError {
    fn from(e: io::Error) -> Self {
        SetupError::Io(e)
    }
}
