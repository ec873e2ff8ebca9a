//! Server role: a listening endpoint multiplexing many accepted peers.
//!
//! One worker thread services the listener and every accepted connection.
//! Peers run as local tasks on that thread, so the dispatcher's handle map
//! is only ever touched from the service loop — single-writer by
//! construction, no lock needed.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, LocalSet};
use tokio_tungstenite::accept_async_with_config;
use tracing::{debug, warn};

use crate::config::Config;
use crate::conn::Connection;
use crate::error::SetupError;
use crate::events::ServerEvents;
use crate::service::{self, Exit, ServiceState};

/// A WebSocket server endpoint.
///
/// Accepted peers surface through [`ServerEvents`]; there is no explicit
/// accept call. Dropping the handle stops the endpoint and joins the worker.
pub struct Server {
    state: Arc<ServiceState>,
    local_addr: SocketAddr,
    worker: Option<thread::JoinHandle<()>>,
}

impl Server {
    /// Bind `port` on all interfaces and start servicing connections.
    ///
    /// Fails synchronously — without starting a thread — if the listener
    /// cannot be bound or the runtime context cannot be created. Pass port
    /// `0` to bind an ephemeral port and read it back from
    /// [`Server::local_addr`].
    pub fn start<E>(port: u16, events: E, config: Config) -> Result<Self, SetupError>
    where
        E: ServerEvents,
    {
        let listener = StdTcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        let state = Arc::new(ServiceState::new());
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("gangway-ws-server".into())
            .spawn(move || {
                runtime.block_on(run(listener, worker_state, Arc::new(events), config))
            })?;
        Ok(Self {
            state,
            local_addr,
            worker: Some(worker),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shut down: stop accepting, wake every connection's wait, give peers a
    /// bounded grace period for their close handshake, and join the worker.
    ///
    /// Blocks until the worker has fully exited; after it returns no further
    /// callbacks fire and any application-held [`Connection`] degrades to a
    /// no-op sender. Idempotent. Must not be called from inside a callback.
    pub fn stop(&mut self) {
        self.state.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("server worker panicked");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle map from connection id to endpoint, plus the id allocator.
///
/// Lives on the service-loop thread only.
struct Dispatcher {
    peers: RefCell<HashMap<u64, Arc<Connection>>>,
    next_id: Cell<u64>,
}

impl Dispatcher {
    fn new() -> Self {
        Self {
            peers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn insert(&self, conn: &Arc<Connection>) {
        self.peers.borrow_mut().insert(conn.id(), Arc::clone(conn));
    }

    fn remove(&self, id: u64) {
        self.peers.borrow_mut().remove(&id);
    }

    /// Invalidate every endpoint still registered at shutdown.
    fn close_all(&self) {
        for (_, conn) in self.peers.borrow_mut().drain() {
            conn.mark_closed();
        }
    }
}

/// Worker thread body: accept loop plus one local task per peer.
async fn run<E>(
    listener: StdTcpListener,
    state: Arc<ServiceState>,
    events: Arc<E>,
    config: Config,
) where
    E: ServerEvents,
{
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, "listener registration failed");
            return;
        }
    };
    debug!(addr = ?listener.local_addr().ok(), "listening");

    let dispatcher = Rc::new(Dispatcher::new());
    let local = LocalSet::new();
    local
        .run_until(async {
            let mut peers: Vec<JoinHandle<()>> = Vec::new();
            loop {
                if !state.is_running() {
                    break;
                }
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer_addr)) => {
                            peers.push(tokio::task::spawn_local(serve_peer(
                                stream,
                                peer_addr,
                                Rc::clone(&dispatcher),
                                Arc::clone(&state),
                                Arc::clone(&events),
                                config.clone(),
                            )));
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                    _ = state.notified() => {}
                    _ = tokio::time::sleep(config.service_slice) => {}
                }
                peers.retain(|task| !task.is_finished());
            }
            // Peers observe the cleared run flag within one slice; wait out
            // their close handshakes, bounded.
            for task in peers {
                let _ = tokio::time::timeout(config.service_slice * 2, task).await;
            }
            dispatcher.close_all();
        })
        .await;
    debug!("server loop exited");
}

/// One accepted peer: handshake, register, pump, unregister.
async fn serve_peer<E>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Rc<Dispatcher>,
    state: Arc<ServiceState>,
    events: Arc<E>,
    config: Config,
) where
    E: ServerEvents,
{
    let mut ws = match accept_async_with_config(stream, config.engine_config()).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer_addr, error = %e, "handshake failed");
            return;
        }
    };

    let conn = Arc::new(Connection::new(
        dispatcher.allocate_id(),
        config.overflow,
        Arc::clone(&state),
    ));
    dispatcher.insert(&conn);
    debug!(%peer_addr, conn = conn.id(), "peer connected");
    events.on_open(&conn);

    let exit = service::drive(&mut ws, &state, &conn, config.service_slice, |payload| {
        events.on_message(&conn, payload)
    })
    .await;

    conn.mark_closed();
    dispatcher.remove(conn.id());
    match exit {
        Exit::Peer => {
            debug!(%peer_addr, conn = conn.id(), "peer disconnected");
            events.on_close(&conn);
        }
        Exit::Stopped => debug!(%peer_addr, conn = conn.id(), "peer closed locally"),
    }
    service::close_quietly(&mut ws, config.service_slice).await;
}
