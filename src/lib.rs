#![deny(unsafe_code)]

//! gangway: threaded bidirectional WebSocket endpoints with event callbacks.
//!
//! Two symmetric roles share one design. A [`Client`] owns a single outbound
//! connection; a [`Server`] accepts many peers. Each endpoint runs exactly
//! one dedicated worker thread that drives the WebSocket engine
//! (`tokio-tungstenite` on a current-thread runtime) and fires the
//! application's callbacks synchronously on that thread.
//!
//! Outbound data goes through a best-effort single-slot queue: each
//! [`Connection`] holds at most one pending message, and a `send` landing on
//! an occupied slot is silently dropped by default (see [`OverflowPolicy`]).
//! `send` never blocks on I/O — it copies the caller's bytes under a brief
//! lock and wakes the service loop, which flushes the slot on its own
//! thread. This bounds memory per connection and matches the
//! one-write-per-writable-event protocol rhythm.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gangway::{Client, ClientEvents, Config, Connection};
//!
//! struct Echo;
//!
//! impl ClientEvents for Echo {
//!     fn on_open(&self, conn: &Arc<Connection>) {
//!         conn.send(b"hello");
//!     }
//!     fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
//!         conn.send(payload);
//!     }
//! }
//!
//! let mut client = Client::connect("wss://example.com/chat", Echo, Config::default())?;
//! // ... later, from any thread:
//! client.send(b"ping");
//! client.close();
//! # Ok::<(), gangway::SetupError>(())
//! ```
//!
//! # Threading contract
//!
//! - Callbacks run on the endpoint's service-loop thread; blocking inside
//!   one stalls all I/O for that endpoint.
//! - `send` is safe from any thread, including from inside callbacks.
//! - `close`/`stop` join the worker thread and therefore deadlock if called
//!   from inside a callback.

mod client;
mod config;
mod conn;
mod error;
mod events;
mod server;
mod service;
mod target;

pub use client::Client;
pub use config::{Config, DEFAULT_SERVICE_SLICE, OverflowPolicy};
pub use conn::Connection;
pub use error::SetupError;
pub use events::{ClientEvents, ServerEvents};
pub use server::Server;
pub use target::Target;
