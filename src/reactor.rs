//! Reactor (C9): the single I/O thread. Owns the listening socket and every
//! connection slot, multiplexes readiness with `mio`, and hands request
//! work off to the worker pool via the blocking work queue (C1).

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use slab::Slab;

use crate::config::{MAX_EVENT_NUMBER, MAX_FD, TIMESLOT};
use crate::connection::{Connection, State};
use crate::dispatch::Engine;
use crate::error::StartupError;
use crate::queue::WorkQueue;
use crate::signals::ShutdownSignal;
use crate::timer::{default_expiry, TimerWheel};

const LISTEN_TOKEN: Token = Token(usize::MAX);
const WAKE_TOKEN: Token = Token(usize::MAX - 1);
const SIGNAL_TOKEN: Token = Token(usize::MAX - 2);

/// Owns the poll loop, the connection slab, and the timer wheel.
pub struct Reactor {
    listener: TcpListener,
    poll: Poll,
    connections: Slab<Arc<Mutex<Connection>>>,
    timers: TimerWheel,
    queue: Arc<WorkQueue>,
    engine: Arc<Engine>,
    completions_rx: Receiver<(Token, bool)>,
    completions_tx: Sender<(Token, bool)>,
    waker: Arc<Waker>,
    shutdown_signal: ShutdownSignal,
    start: Instant,
    accepting: bool,
}

impl Reactor {
    pub fn bind(
        addr: SocketAddr,
        queue: Arc<WorkQueue>,
        engine: Arc<Engine>,
    ) -> Result<Self, StartupError> {
        let mut listener = TcpListener::bind(addr).map_err(StartupError::Bind)?;
        let poll = Poll::new().map_err(StartupError::Poll)?;

        poll.registry()
            .register(&mut listener, LISTEN_TOKEN, Interest::READABLE)
            .map_err(StartupError::Poll)?;

        let waker =
            Arc::new(Waker::new(poll.registry(), WAKE_TOKEN).map_err(StartupError::Poll)?);

        let mut shutdown_signal = ShutdownSignal::new().map_err(StartupError::Signal)?;
        shutdown_signal
            .register(poll.registry(), SIGNAL_TOKEN)
            .map_err(StartupError::Signal)?;

        let (completions_tx, completions_rx) = unbounded();

        Ok(Self {
            listener,
            poll,
            connections: Slab::new(),
            timers: TimerWheel::new(),
            queue,
            engine,
            completions_rx,
            completions_tx,
            waker,
            shutdown_signal,
            start: Instant::now(),
            accepting: true,
        })
    }

    /// The `Waker` used to notify this reactor from worker threads; cloned
    /// into every task queued by [`dispatch_readiness`](Self::dispatch_readiness).
    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    fn now_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn accept(&mut self) -> io::Result<()> {
        loop {
            if self.connections.len() >= MAX_FD {
                log::warn!("at MAX_FD ({}), refusing new connections", MAX_FD);
                return Ok(());
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let entry = self.connections.vacant_entry();
                    let token = Token(entry.key());
                    let mut connection = Connection::new(token, stream, peer);

                    if connection.register_readable(self.poll.registry()).is_ok() {
                        self.timers.add(token.0, default_expiry(self.now_secs()));
                        entry.insert(Arc::new(Mutex::new(connection)));
                        log::debug!("accepted connection {peer} as {token:?}");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Queues a task that runs the appropriate `Connection` step for the
    /// readiness kind observed, then reports completion back over the
    /// channel so this reactor can re-register or close the slot.
    ///
    /// Enforces the one-task-per-slot invariant (§3/§5: at most one task
    /// referencing a slot may be queued or executing at a time) by
    /// deregistering the slot's interest *before* queueing its task.
    /// `mio` 0.8 has no one-shot registration, so a deregistered fd is the
    /// only way to guarantee no further readiness event for this token can
    /// arrive until [`complete`](Self::complete) re-registers it once the
    /// task has actually finished.
    fn dispatch_readiness(&mut self, token: Token, event: &mio::event::Event) {
        let Some(slot) = self.connections.get(token.0) else {
            return;
        };

        {
            let mut conn = match slot.lock() {
                Ok(c) => c,
                Err(poisoned) => poisoned.into_inner(),
            };
            if conn.is_closed() {
                return;
            }
            if let Err(e) = conn.deregister(self.poll.registry()) {
                log::warn!("failed to deregister {token:?} before dispatch: {e}");
            }
        }

        let connection = slot.clone();
        let engine = self.engine.clone();
        let tx = self.completions_tx.clone();
        let waker = self.waker.clone();
        let readable = event.is_readable();
        let writable = event.is_writable();

        self.queue.push(Box::new(move || {
            let mut conn = match connection.lock() {
                Ok(c) => c,
                Err(poisoned) => poisoned.into_inner(),
            };

            let mut read_succeeded = false;
            if readable {
                match conn.read() {
                    Ok(true) => {
                        read_succeeded = true;
                        if conn.process(&engine) {
                            let _ = conn.write();
                        }
                    }
                    Ok(false) | Err(_) => {}
                }
            } else if writable {
                let _ = conn.write();
            }

            let token = conn.token();
            drop(conn);
            let _ = tx.send((token, read_succeeded));
            let _ = waker.wake();
        }));
    }

    /// Drains the completion channel, re-registering or closing each slot
    /// according to the state its worker task left it in.
    fn drain_completions(&mut self) {
        loop {
            let (token, read_succeeded) = match self.completions_rx.try_recv() {
                Ok(entry) => entry,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => return,
            };
            self.complete(token, read_succeeded);
        }
    }

    /// Re-registers the slot for whatever readiness its next step needs, or
    /// tears it down if its task left it `Closed`. Re-arms the idle timer
    /// whenever the task's read succeeded (§4.7: "every successful read ...
    /// re-arms it"), independent of whether the slot went on to finish a
    /// reply in the same task — a request that read completely but is still
    /// draining its write buffer must not go stale on its old expiry.
    fn complete(&mut self, token: Token, read_succeeded: bool) {
        let Some(slot) = self.connections.get(token.0) else {
            return;
        };

        let mut conn = match slot.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };

        if read_succeeded {
            self.timers.adjust(token.0, default_expiry(self.now_secs()));
        }

        match conn.state() {
            State::Closed => {
                let peer = conn.peer_addr();
                drop(conn);
                self.connections.try_remove(token.0);
                self.timers.del(token.0);
                log::debug!("closed connection {token:?} ({peer})");
            }
            State::Reading => {
                let _ = conn.register_readable(self.poll.registry());
            }
            State::Writing => {
                let _ = conn.register_writable(self.poll.registry());
            }
            State::Processing => unreachable!("tasks never leave a slot mid-process"),
        }
    }

    /// Sweeps expired idle connections.
    fn tick(&mut self) {
        let now = self.now_secs();
        for token in self.timers.tick(now) {
            if let Some(slot) = self.connections.get(token) {
                let mut conn = slot.lock().unwrap_or_else(|p| p.into_inner());
                let peer = conn.peer_addr();
                let _ = conn.deregister(self.poll.registry());
                drop(conn);
                self.connections.try_remove(token);
                log::debug!("reaped idle connection {token} ({peer})");
            }
        }
    }

    /// Runs the event loop until `SIGTERM` is observed, then closes every
    /// open socket and returns.
    pub fn run(mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(MAX_EVENT_NUMBER);

        'outer: loop {
            match self.poll.poll(&mut events, Some(TIMESLOT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                match event.token() {
                    LISTEN_TOKEN => {
                        if self.accepting {
                            self.accept()?;
                        }
                    }
                    WAKE_TOKEN => self.drain_completions(),
                    SIGNAL_TOKEN => {
                        if self.shutdown_signal.poll_shutdown_requested() {
                            log::info!("SIGTERM received, shutting down");
                            break 'outer;
                        }
                    }
                    token => self.dispatch_readiness(token, event),
                }
            }

            self.tick();
        }

        self.shutdown();
        Ok(())
    }

    /// Stops accepting, deregisters and drops every connection. The
    /// caller (`lib::run`) cancels the work queue and joins the worker
    /// pool afterward.
    fn shutdown(&mut self) {
        self.accepting = false;
        let _ = self.poll.registry().deregister(&mut self.listener);

        for (_, slot) in self.connections.iter() {
            let mut conn = slot.lock().unwrap_or_else(|p| p.into_inner());
            if conn.has_pending_write() {
                log::warn!(
                    "dropping connection {} with an unflushed reply at shutdown",
                    conn.peer_addr()
                );
            }
            let _ = conn.deregister(self.poll.registry());
        }
        self.connections.clear();
    }
}
