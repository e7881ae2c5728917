//! ConnectionMultiplexer: drives many in-flight connections through their
//! lifecycle within one control flow.
//!
//! # Design
//! Concurrency here is cooperative: every socket is non-blocking from birth
//! (`mio::net::TcpStream`), all of them are registered with one `Poll`, and a
//! single loop advances whichever connections report readiness. The loop
//! blocks only at the readiness poll, for at most one bounded tick per
//! iteration.
//!
//! Each connection is one state-machine value in a token-keyed registry —
//! `Queued → Connecting → Writable → ReadableWaiting → Complete | Failed`,
//! never revisiting a state. Every submitted request yields exactly one
//! terminal outcome: a parsed response or an explicit failure. Completion
//! order is unrelated to submission order; results carry their originating
//! request and callers must not rely on position.
//!
//! After connect-readiness the socket is confirmed usable via its error slot
//! and peer address, re-checked a small fixed number of times with short
//! sleeps; exhausting the retries fails the connection without sending
//! anything (`NonBlockingActivationFailure`).
//!
//! `https` endpoints need a transport-security collaborator to wrap the
//! stream; this engine bundles none and fails such connections with a
//! `ConnectFailure` naming the gap.

use std::io::{self, Read, Write};
use std::net::ToSocketAddrs;
use std::thread;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Registry, Token};

use crate::error::Error;
use crate::http::{Request, Scheme};
use crate::response::{parse, ParseOptions, ParseOutcome, RawResponse};

/// Upper bound on one readiness wait.
const POLL_TICK: Duration = Duration::from_secs(1);
/// Bounded re-checks of a connect-ready socket before giving up on it.
const CONNECT_CHECK_RETRIES: u32 = 5;
const CONNECT_CHECK_SLEEP: Duration = Duration::from_millis(10);
const EVENTS_CAPACITY: usize = 64;
const READ_CHUNK: usize = 8192;

/// Lifecycle of one connection. Monotonic: no state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Queued,
    Connecting,
    Writable,
    ReadableWaiting,
    Complete,
    Failed,
}

impl ConnState {
    fn is_terminal(self) -> bool {
        matches!(self, ConnState::Complete | ConnState::Failed)
    }
}

/// One in-flight connection: its request, socket, receive buffer and clock.
struct Connection {
    request: Request,
    message: Vec<u8>,
    written: usize,
    stream: Option<TcpStream>,
    state: ConnState,
    buf: Vec<u8>,
    created: Instant,
    outcome: Option<Result<RawResponse, Error>>,
}

impl Connection {
    fn deadline(&self) -> Instant {
        self.created + Duration::from_secs(self.request.timeout_secs.max(1))
    }
}

/// Terminal result for one submitted request.
#[derive(Debug)]
pub struct Completion {
    pub request: Request,
    pub result: Result<RawResponse, Error>,
}

/// Owns the registry of in-flight connections and advances them with
/// non-blocking I/O under bounded polling.
pub struct Multiplexer {
    poll: Poll,
    connections: Vec<Connection>,
    options: ParseOptions,
}

impl Multiplexer {
    pub fn new(options: ParseOptions) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            connections: Vec::new(),
            options,
        })
    }

    /// Queue a request with its prebuilt message bytes. Returns the internal
    /// identifier its completion will be keyed by.
    pub fn submit(&mut self, request: Request, message: Vec<u8>) -> usize {
        self.connections.push(Connection {
            request,
            message,
            written: 0,
            stream: None,
            state: ConnState::Queued,
            buf: Vec::new(),
            created: Instant::now(),
            outcome: None,
        });
        self.connections.len() - 1
    }

    /// Drive every submitted connection to a terminal state and return one
    /// completion per request, keyed by submission identifier.
    pub fn run(&mut self) -> Vec<Completion> {
        for idx in 0..self.connections.len() {
            if self.connections[idx].state == ConnState::Queued {
                self.launch(idx);
            }
        }

        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        loop {
            self.expire_overdue();
            let tick = match self.next_tick() {
                Some(tick) => tick,
                None => break,
            };

            if let Err(e) = self.poll.poll(&mut events, Some(tick)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                self.fail_pending(&format!("readiness poll failed: {e}"));
                break;
            }

            let ready: Vec<(Token, bool, bool)> = events
                .iter()
                .map(|e| (e.token(), e.is_writable(), e.is_readable()))
                .collect();
            for (token, writable, readable) in ready {
                self.advance(token.0, writable, readable);
            }
        }

        std::mem::take(&mut self.connections)
            .into_iter()
            .map(|mut conn| Completion {
                result: conn.outcome.take().unwrap_or_else(|| {
                    Err(Error::ConnectFailure(
                        "connection never reached a terminal state".to_string(),
                    ))
                }),
                request: conn.request,
            })
            .collect()
    }

    /// `Queued → Connecting`: issue the non-blocking connect and register
    /// for writability.
    fn launch(&mut self, idx: usize) {
        let registry = self.poll.registry();
        let conn = &mut self.connections[idx];

        if conn.request.endpoint.scheme == Scheme::Https {
            fail(
                conn,
                registry,
                Error::ConnectFailure(
                    "https endpoint requires a transport-security collaborator; none is configured"
                        .to_string(),
                ),
            );
            return;
        }

        let host = conn.request.endpoint.host.clone();
        let port = conn.request.endpoint.port;
        let addr = match (host.as_str(), port).to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    fail(
                        conn,
                        registry,
                        Error::ConnectFailure(format!("{host}:{port} resolved to no addresses")),
                    );
                    return;
                }
            },
            Err(e) => {
                fail(
                    conn,
                    registry,
                    Error::ConnectFailure(format!("resolving {host}:{port}: {e}")),
                );
                return;
            }
        };

        let mut stream = match TcpStream::connect(addr) {
            Ok(stream) => stream,
            Err(e) => {
                fail(conn, registry, Error::ConnectFailure(e.to_string()));
                return;
            }
        };

        if let Err(e) = registry.register(&mut stream, Token(idx), Interest::WRITABLE) {
            fail(conn, registry, Error::ConnectFailure(format!("register: {e}")));
            return;
        }
        conn.stream = Some(stream);
        conn.state = ConnState::Connecting;
    }

    /// Advance one connection according to the readiness it reported.
    fn advance(&mut self, idx: usize, writable: bool, readable: bool) {
        let registry = self.poll.registry();
        let Some(conn) = self.connections.get_mut(idx) else {
            return;
        };
        if conn.state.is_terminal() {
            return;
        }

        if conn.state == ConnState::Connecting && writable {
            if !confirm_connected(conn, registry) {
                return;
            }
        }

        if conn.state == ConnState::Writable && writable {
            write_message(conn, registry, Token(idx));
        }

        if conn.state == ConnState::ReadableWaiting && readable {
            read_available(conn, registry, &self.options);
        }
    }

    /// Abandon connections past their per-request timeout: treated as
    /// `Failed`, not retried.
    fn expire_overdue(&mut self) {
        let now = Instant::now();
        let registry = self.poll.registry();
        for conn in &mut self.connections {
            if conn.state.is_terminal() || now < conn.deadline() {
                continue;
            }
            let secs = conn.request.timeout_secs.max(1);
            let error = match conn.state {
                ConnState::Queued | ConnState::Connecting => {
                    Error::ConnectFailure(format!("connect timed out after {secs}s"))
                }
                ConnState::Writable => {
                    Error::WriteFailure(format!("write timed out after {secs}s"))
                }
                _ => Error::MalformedResponse(format!(
                    "response incomplete after {secs}s ({} bytes buffered)",
                    conn.buf.len()
                )),
            };
            fail(conn, registry, error);
        }
    }

    /// Next bounded wait: the nearest pending deadline, capped at one tick.
    /// `None` once every connection is terminal.
    fn next_tick(&self) -> Option<Duration> {
        let now = Instant::now();
        let nearest = self
            .connections
            .iter()
            .filter(|c| !c.state.is_terminal())
            .map(|c| c.deadline().saturating_duration_since(now))
            .min()?;
        Some(nearest.min(POLL_TICK).max(Duration::from_millis(1)))
    }

    fn fail_pending(&mut self, reason: &str) {
        let registry = self.poll.registry();
        for conn in &mut self.connections {
            if !conn.state.is_terminal() {
                fail(conn, registry, Error::ConnectFailure(reason.to_string()));
            }
        }
    }
}

/// `Connecting → Writable`: the socket reported connect-readiness. Confirm
/// it actually settled, re-checking a bounded number of times with short
/// sleeps; a socket-level error is a `ConnectFailure`, a socket that never
/// settles is a `NonBlockingActivationFailure`.
fn confirm_connected(conn: &mut Connection, registry: &Registry) -> bool {
    let stream = match conn.stream.as_ref() {
        Some(stream) => stream,
        None => return false,
    };

    match stream.take_error() {
        Ok(Some(e)) => {
            fail(conn, registry, Error::ConnectFailure(e.to_string()));
            return false;
        }
        Ok(None) => {}
        Err(e) => {
            fail(conn, registry, Error::ConnectFailure(e.to_string()));
            return false;
        }
    }

    let mut checks = 0;
    loop {
        match stream.peer_addr() {
            Ok(_) => {
                conn.state = ConnState::Writable;
                return true;
            }
            Err(e)
                if e.kind() == io::ErrorKind::NotConnected
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                checks += 1;
                if checks > CONNECT_CHECK_RETRIES {
                    fail(
                        conn,
                        registry,
                        Error::NonBlockingActivationFailure(format!(
                            "socket reported no peer after {CONNECT_CHECK_RETRIES} checks"
                        )),
                    );
                    return false;
                }
                thread::sleep(CONNECT_CHECK_SLEEP);
            }
            Err(e) => {
                fail(conn, registry, Error::ConnectFailure(e.to_string()));
                return false;
            }
        }
    }
}

/// `Writable → ReadableWaiting`: push the message out, continuing short
/// writes with the remaining bytes. A socket error closes and drops the
/// connection.
fn write_message(conn: &mut Connection, registry: &Registry, token: Token) {
    loop {
        if conn.written >= conn.message.len() {
            break;
        }
        let stream = match conn.stream.as_mut() {
            Some(stream) => stream,
            None => return,
        };
        match stream.write(&conn.message[conn.written..]) {
            Ok(0) => {
                fail(
                    conn,
                    registry,
                    Error::WriteFailure("socket closed during write".to_string()),
                );
                return;
            }
            Ok(n) => conn.written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                fail(conn, registry, Error::WriteFailure(e.to_string()));
                return;
            }
        }
    }

    let stream = match conn.stream.as_mut() {
        Some(stream) => stream,
        None => return,
    };
    let _ = stream.flush();
    if let Err(e) = registry.reregister(stream, token, Interest::READABLE) {
        fail(conn, registry, Error::WriteFailure(format!("reregister: {e}")));
        return;
    }
    conn.state = ConnState::ReadableWaiting;
}

/// `ReadableWaiting → Complete`: append whatever is available; end-of-stream
/// hands the buffer to the parser.
fn read_available(conn: &mut Connection, registry: &Registry, options: &ParseOptions) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let stream = match conn.stream.as_mut() {
            Some(stream) => stream,
            None => return,
        };
        match stream.read(&mut chunk) {
            Ok(0) => {
                finish(conn, registry, options);
                return;
            }
            Ok(n) => conn.buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                fail(
                    conn,
                    registry,
                    Error::MalformedResponse(format!("stream errored mid-read: {e}")),
                );
                return;
            }
        }
    }
}

/// End-of-stream: parse the accumulated buffer. A header block that never
/// terminated is a malformed response, not a retryable condition.
fn finish(conn: &mut Connection, registry: &Registry, options: &ParseOptions) {
    close(conn, registry);
    match parse(&conn.buf, options) {
        ParseOutcome::Complete(raw) => {
            conn.state = ConnState::Complete;
            conn.outcome = Some(Ok(raw));
        }
        ParseOutcome::Incomplete => {
            conn.state = ConnState::Failed;
            conn.outcome = Some(Err(Error::MalformedResponse(format!(
                "header block never terminated ({} bytes buffered)",
                conn.buf.len()
            ))));
        }
    }
}

fn fail(conn: &mut Connection, registry: &Registry, error: Error) {
    close(conn, registry);
    conn.state = ConnState::Failed;
    conn.outcome = Some(Err(error));
}

fn close(conn: &mut Connection, registry: &Registry) {
    if let Some(mut stream) = conn.stream.take() {
        let _ = registry.deregister(&mut stream);
    }
}

/// Seam between the dispatcher and the network. The default implementation
/// drives the multiplexer; tests substitute fakes to count round trips.
pub trait Transport {
    /// Execute a batch of prebuilt requests, producing exactly one
    /// completion per entry.
    fn execute(&mut self, batch: Vec<(Request, Vec<u8>)>) -> Vec<Completion>;
}

/// The real transport: one multiplexer run per batch.
pub struct MioTransport {
    options: ParseOptions,
}

impl MioTransport {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }
}

impl Transport for MioTransport {
    fn execute(&mut self, batch: Vec<(Request, Vec<u8>)>) -> Vec<Completion> {
        let mut mux = match Multiplexer::new(self.options.clone()) {
            Ok(mux) => mux,
            Err(e) => {
                // No poll means no I/O at all; every request still gets its
                // terminal outcome.
                return batch
                    .into_iter()
                    .map(|(request, _)| Completion {
                        request,
                        result: Err(Error::ConnectFailure(format!("poll creation failed: {e}"))),
                    })
                    .collect();
            }
        };
        for (request, message) in batch {
            mux.submit(request, message);
        }
        mux.run()
    }
}
