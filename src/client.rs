//! Client role: one outbound connection driven by a dedicated worker thread.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio_tungstenite::connect_async_with_config;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::conn::Connection;
use crate::error::SetupError;
use crate::events::ClientEvents;
use crate::service::{self, Exit, ServiceState};
use crate::target::Target;

/// State shared between the [`Client`] handle and its worker thread.
struct Shared {
    state: Arc<ServiceState>,
    /// The live connection, published on open and cleared on close so the
    /// facade can route `send`s (and turn them into no-ops when there is
    /// nothing to send to).
    conn: Mutex<Option<Arc<Connection>>>,
}

/// A WebSocket client endpoint.
///
/// [`Client::connect`] returns as soon as the worker thread is running;
/// establishment completes asynchronously and is reported through
/// [`ClientEvents::on_open`] (or [`ClientEvents::on_error`] if the attempt
/// fails). Dropping the handle closes the connection and joins the worker.
pub struct Client {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Connect to `target` (`ws://…` or `wss://…`).
    ///
    /// Fails synchronously — without starting a thread — if the target
    /// string is malformed or the runtime context cannot be created. The
    /// connect request itself is issued from the worker thread; its outcome
    /// arrives through `events`.
    pub fn connect<E>(target: &str, events: E, config: Config) -> Result<Self, SetupError>
    where
        E: ClientEvents,
    {
        let target: Target = target.parse()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        let shared = Arc::new(Shared {
            state: Arc::new(ServiceState::new()),
            conn: Mutex::new(None),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("gangway-ws-client".into())
            .spawn(move || runtime.block_on(run(worker_shared, target, events, config)))?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Queue `payload` for transmission on the live connection.
    ///
    /// A no-op while no connection is established (before `on_open`, after
    /// close). Subject to the endpoint's overflow policy: by default a send
    /// landing on an occupied slot is silently dropped.
    pub fn send(&self, payload: &[u8]) {
        let conn = self.shared.conn.lock().clone();
        match conn {
            Some(conn) => conn.send(payload),
            None => trace!("send with no live connection ignored"),
        }
    }

    /// Whether the connection is currently established.
    pub fn is_open(&self) -> bool {
        self.shared
            .conn
            .lock()
            .as_ref()
            .is_some_and(|c| c.is_open())
    }

    /// Shut down: order the service loop to exit, wake it, and join the
    /// worker thread.
    ///
    /// Blocks until the worker has fully exited; after it returns no further
    /// callbacks fire and `send` is a safe no-op. Idempotent. Must not be
    /// called from inside a callback (the callback runs on the thread being
    /// joined).
    pub fn close(&mut self) {
        self.shared.state.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("client worker panicked");
            }
        }
        if let Some(conn) = self.shared.conn.lock().take() {
            conn.mark_closed();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Worker thread body: connect, publish the endpoint, pump the connection.
async fn run<E>(shared: Arc<Shared>, target: Target, events: E, config: Config)
where
    E: ClientEvents,
{
    let url = target.url();
    debug!(%url, "connecting");
    let connect = connect_async_with_config(url.as_str(), config.engine_config(), false);
    let mut ws = tokio::select! {
        res = connect => match res {
            Ok((ws, _response)) => ws,
            Err(e) => {
                debug!(%url, error = %e, "connect failed");
                events.on_error(&e.to_string());
                return;
            }
        },
        _ = service::stopped(&shared.state, config.service_slice) => {
            debug!(%url, "closed before establishment");
            return;
        }
    };

    let conn = Arc::new(Connection::new(
        0,
        config.overflow,
        Arc::clone(&shared.state),
    ));
    *shared.conn.lock() = Some(Arc::clone(&conn));
    debug!(%url, "connected");
    events.on_open(&conn);

    let exit = service::drive(
        &mut ws,
        &shared.state,
        &conn,
        config.service_slice,
        |payload| events.on_message(&conn, payload),
    )
    .await;

    conn.mark_closed();
    shared.conn.lock().take();
    match exit {
        Exit::Peer => {
            debug!(%url, "connection closed by peer");
            events.on_close(&conn);
        }
        Exit::Stopped => debug!(%url, "connection closed locally"),
    }
    service::close_quietly(&mut ws, config.service_slice).await;
}
