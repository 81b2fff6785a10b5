//! Connection slot (C8): per-socket state machine driven by the reactor and
//! executed by worker-pool tasks.

use std::borrow::BorrowMut;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

use crate::buffer::Buffer;
use crate::config::CONNECTION_BUFFER_CAPACITY;
use crate::dispatch::Engine;
use crate::http::{self, Method};

/// Where a connection sits in its request/response cycle.
///
/// `READING → PROCESSING → WRITING → (READING | CLOSED)`, per the
/// connection slot's lifecycle: at most one worker ever touches a slot
/// between two state transitions, enforced by the reactor only queueing a
/// slot for processing once per readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Reading,
    Processing,
    Writing,
    Closed,
}

/// A single client socket plus its read/write buffers and parse state.
pub struct Connection {
    token: Token,
    stream: TcpStream,
    peer: SocketAddr,
    read_buf: Buffer,
    write_buf: Buffer,
    state: State,
    keep_alive: bool,
}

impl Connection {
    /// Wraps a freshly accepted socket. Does not register it with any
    /// `Poll`; the caller does that once the slot has a stable `Token`.
    pub fn new(token: Token, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            token,
            stream,
            peer,
            read_buf: Buffer::new(CONNECTION_BUFFER_CAPACITY),
            write_buf: Buffer::new(CONNECTION_BUFFER_CAPACITY),
            state: State::Reading,
            keep_alive: true,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Registers for readable readiness. The reactor only ever calls this
    /// (never `reregister`): a slot is always fully deregistered by
    /// [`dispatch_readiness`](crate::reactor::Reactor) before its task is
    /// queued, so by the time the reactor re-arms a slot there is nothing
    /// registered to `reregister` against.
    pub fn register_readable(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, Interest::READABLE)
    }

    /// Registers for writable readiness, same one-shot-by-deregistration
    /// discipline as [`register_readable`](Self::register_readable).
    pub fn register_writable(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, Interest::WRITABLE)
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.stream)
    }

    /// Drains the socket into the read buffer until `WouldBlock` or peer
    /// close. Returns `Ok(true)` on a normal drain (possibly zero bytes
    /// available right now), `Ok(false)` if the peer closed its half.
    pub fn read(&mut self) -> io::Result<bool> {
        loop {
            if self.read_buf.remaining_mut() < 4096 {
                self.read_buf.reserve(4096);
            }

            match self.stream.read(self.read_buf.borrow_mut()) {
                Ok(0) => {
                    self.state = State::Closed;
                    return Ok(false);
                }
                Ok(n) => self.read_buf.mark_written(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = State::Closed;
                    return Err(e);
                }
            }
        }
    }

    /// Parses one request out of the read buffer and, if complete, routes
    /// it and fills the write buffer with a reply. Returns `true` once a
    /// response is ready to flush; `false` means more bytes are needed and
    /// the slot should go back to waiting on readable readiness.
    pub fn process(&mut self, engine: &Engine) -> bool {
        self.state = State::Processing;

        let request = match http::parse_request(&self.read_buf) {
            Ok(Some(request)) => request,
            Ok(None) => {
                self.state = State::Reading;
                return false;
            }
            Err(_) => {
                self.state = State::Closed;
                return false;
            }
        };

        let consumed = http::consumed_len(&self.read_buf, &request);
        self.read_buf.mark_read(consumed);
        self.keep_alive = request.keep_alive;

        let response = route(&request, engine);
        self.write_buf
            .write_all(&response)
            .expect("Buffer::write_all never errors");

        self.state = State::Writing;
        true
    }

    /// Flushes the write buffer. Returns `true` if the connection should
    /// keep reading (keep-alive, fully flushed), `false` if the reactor
    /// should close it.
    pub fn write(&mut self) -> io::Result<bool> {
        while self.write_buf.remaining() > 0 {
            match self.stream.write(&self.write_buf) {
                Ok(0) => {
                    self.state = State::Closed;
                    return Ok(false);
                }
                Ok(n) => self.write_buf.mark_read(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = State::Closed;
                    return Err(e);
                }
            }
        }

        if self.keep_alive {
            self.state = State::Reading;
            Ok(true)
        } else {
            self.state = State::Closed;
            Ok(false)
        }
    }

    /// Whether the slot still has a response pending flush.
    pub fn has_pending_write(&self) -> bool {
        self.write_buf.remaining() > 0
    }
}

fn route(request: &http::Request, engine: &Engine) -> Vec<u8> {
    match (request.method, request.path.as_str()) {
        (Method::Post, "/api/kv") => {
            let body = engine.handle_request_body(&request.body);
            http::json_response("200 OK", &body, request.keep_alive)
        }
        (Method::Get, "/api/stats") => {
            http::json_response("200 OK", &engine.stats_response(), request.keep_alive)
        }
        _ => {
            let body = br#"{"status":"ERROR","message":"Not Found"}"#;
            http::json_response("404 Not Found", body, request.keep_alive)
        }
    }
}
