//! End-to-end tests over real loopback sockets.
//!
//! Each test starts a server on an ephemeral port and/or a client against
//! it, records callback events through an mpsc channel, and asserts on the
//! observed sequence with bounded waits.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::Duration;

use parking_lot::Mutex;

use gangway::{Client, ClientEvents, Config, Connection, Server, ServerEvents, SetupError};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ev {
    Open,
    Message(Vec<u8>),
    Close,
    Error(String),
}

/// Records every callback into a channel; optionally echoes inbound
/// messages back and/or sends a greeting on open.
struct Recorder {
    tx: Mutex<Sender<Ev>>,
    echo: bool,
    greeting: Option<Vec<u8>>,
}

impl Recorder {
    fn new() -> (Self, Receiver<Ev>) {
        Self::build(false, None)
    }

    fn echoing() -> (Self, Receiver<Ev>) {
        Self::build(true, None)
    }

    fn greeting(payload: &[u8]) -> (Self, Receiver<Ev>) {
        Self::build(false, Some(payload.to_vec()))
    }

    fn build(echo: bool, greeting: Option<Vec<u8>>) -> (Self, Receiver<Ev>) {
        let (tx, rx) = channel();
        (
            Self {
                tx: Mutex::new(tx),
                echo,
                greeting,
            },
            rx,
        )
    }

    fn record(&self, ev: Ev) {
        // The receiving side may already be gone during teardown.
        let _ = self.tx.lock().send(ev);
    }
}

impl ClientEvents for Recorder {
    fn on_open(&self, conn: &Arc<Connection>) {
        if let Some(greeting) = &self.greeting {
            conn.send(greeting);
        }
        self.record(Ev::Open);
    }

    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
        if self.echo {
            conn.send(payload);
        }
        self.record(Ev::Message(payload.to_vec()));
    }

    fn on_close(&self, _conn: &Arc<Connection>) {
        self.record(Ev::Close);
    }

    fn on_error(&self, error: &str) {
        self.record(Ev::Error(error.to_string()));
    }
}

impl ServerEvents for Recorder {
    fn on_open(&self, _conn: &Arc<Connection>) {
        self.record(Ev::Open);
    }

    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
        if self.echo {
            conn.send(payload);
        }
        self.record(Ev::Message(payload.to_vec()));
    }

    fn on_close(&self, _conn: &Arc<Connection>) {
        self.record(Ev::Close);
    }
}

fn expect(rx: &Receiver<Ev>) -> Ev {
    rx.recv_timeout(WAIT).expect("timed out waiting for event")
}

fn assert_quiet(rx: &Receiver<Ev>) {
    match rx.recv_timeout(Duration::from_millis(200)) {
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        Ok(ev) => panic!("unexpected event after close: {ev:?}"),
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn ping_round_trip() {
    init_logging();
    let (server_events, server_rx) = Recorder::echoing();
    let mut server = Server::start(0, server_events, Config::default()).unwrap();
    let port = server.local_addr().port();

    let (client_events, client_rx) = Recorder::greeting(b"ping");
    let mut client = Client::connect(
        &format!("ws://127.0.0.1:{port}"),
        client_events,
        Config::default(),
    )
    .unwrap();

    assert_eq!(expect(&client_rx), Ev::Open);
    assert_eq!(expect(&server_rx), Ev::Open);
    // The server receives exactly the bytes "ping" and echoes them back.
    assert_eq!(expect(&server_rx), Ev::Message(b"ping".to_vec()));
    assert_eq!(expect(&client_rx), Ev::Message(b"ping".to_vec()));

    // Closing the client completes the close handshake; the server sees the
    // peer go away.
    client.close();
    assert_eq!(expect(&server_rx), Ev::Close);
    server.stop();
}

#[test]
fn open_precedes_messages_and_close_is_terminal() {
    init_logging();
    let (server_events, _server_rx) = Recorder::echoing();
    let mut server = Server::start(0, server_events, Config::default()).unwrap();
    let port = server.local_addr().port();

    let (client_events, client_rx) = Recorder::greeting(b"hello");
    let mut client = Client::connect(
        &format!("ws://127.0.0.1:{port}"),
        client_events,
        Config::default(),
    )
    .unwrap();

    assert_eq!(expect(&client_rx), Ev::Open);
    assert_eq!(expect(&client_rx), Ev::Message(b"hello".to_vec()));

    // Stopping the server closes its peers; the client observes on_close
    // exactly once and nothing after it.
    server.stop();
    assert_eq!(expect(&client_rx), Ev::Close);
    assert_quiet(&client_rx);
    client.close();
}

#[test]
fn invalid_target_fails_without_callbacks() {
    init_logging();
    let (events, rx) = Recorder::new();
    let err = Client::connect("not-a-url", events, Config::default()).unwrap_err();
    assert!(matches!(err, SetupError::InvalidTarget(_)));
    assert_quiet(&rx);
}

#[test]
fn refused_connection_surfaces_on_error() {
    init_logging();
    // Find a port with nothing listening by binding and dropping a listener.
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let (events, rx) = Recorder::new();
    let mut client = Client::connect(
        &format!("ws://127.0.0.1:{port}"),
        events,
        Config::default(),
    )
    .unwrap();
    match expect(&rx) {
        Ev::Error(_) => {}
        other => panic!("expected on_error, got {other:?}"),
    }
    client.close();
}

#[test]
fn close_is_idempotent_and_send_after_close_is_a_noop() {
    init_logging();
    let (server_events, server_rx) = Recorder::new();
    let mut server = Server::start(0, server_events, Config::default()).unwrap();
    let port = server.local_addr().port();

    let (client_events, client_rx) = Recorder::new();
    let mut client = Client::connect(
        &format!("ws://127.0.0.1:{port}"),
        client_events,
        Config::default(),
    )
    .unwrap();
    assert_eq!(expect(&client_rx), Ev::Open);
    assert!(client.is_open());

    client.close();
    assert!(!client.is_open());
    client.close();
    client.send(b"late");
    assert_quiet(&client_rx);

    assert_eq!(expect(&server_rx), Ev::Open);
    assert_eq!(expect(&server_rx), Ev::Close);
    server.stop();
    server.stop();
}

#[test]
fn server_send_reaches_client() {
    init_logging();
    struct Greeter {
        tx: Mutex<Sender<Ev>>,
    }
    impl ServerEvents for Greeter {
        fn on_open(&self, conn: &Arc<Connection>) {
            conn.send(b"welcome");
            let _ = self.tx.lock().send(Ev::Open);
        }
    }

    let (tx, server_rx) = channel();
    let mut server = Server::start(0, Greeter { tx: Mutex::new(tx) }, Config::default()).unwrap();
    let port = server.local_addr().port();

    let (client_events, client_rx) = Recorder::new();
    let mut client = Client::connect(
        &format!("ws://127.0.0.1:{port}"),
        client_events,
        Config::default(),
    )
    .unwrap();

    assert_eq!(expect(&server_rx), Ev::Open);
    assert_eq!(expect(&client_rx), Ev::Open);
    assert_eq!(expect(&client_rx), Ev::Message(b"welcome".to_vec()));

    client.close();
    server.stop();
}

#[test]
fn two_clients_are_dispatched_independently() {
    init_logging();
    let (server_events, server_rx) = Recorder::echoing();
    let mut server = Server::start(0, server_events, Config::default()).unwrap();
    let port = server.local_addr().port();
    let url = format!("ws://127.0.0.1:{port}");

    let (a_events, a_rx) = Recorder::greeting(b"from-a");
    let mut a = Client::connect(&url, a_events, Config::default()).unwrap();
    assert_eq!(expect(&a_rx), Ev::Open);
    assert_eq!(expect(&a_rx), Ev::Message(b"from-a".to_vec()));

    let (b_events, b_rx) = Recorder::greeting(b"from-b");
    let mut b = Client::connect(&url, b_events, Config::default()).unwrap();
    assert_eq!(expect(&b_rx), Ev::Open);
    assert_eq!(expect(&b_rx), Ev::Message(b"from-b".to_vec()));

    // The server saw both peers and both payloads, routed to the right
    // echo targets above.
    let mut opens = 0;
    let mut payloads = Vec::new();
    for _ in 0..4 {
        match expect(&server_rx) {
            Ev::Open => opens += 1,
            Ev::Message(payload) => payloads.push(payload),
            other => panic!("unexpected server event: {other:?}"),
        }
    }
    assert_eq!(opens, 2);
    payloads.sort();
    assert_eq!(payloads, vec![b"from-a".to_vec(), b"from-b".to_vec()]);

    a.close();
    b.close();
    server.stop();
}
