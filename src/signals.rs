//! Signal handling: `SIGTERM` drives graceful shutdown through the `mio`
//! registry via a self-pipe, `SIGPIPE` is left to Rust's runtime default
//! (ignored before `main` runs, unlike the C original which ignores it
//! explicitly in `main()`).

use std::io;

use mio::{Interest, Registry, Token};
use signal_hook::consts::SIGTERM;
use signal_hook_mio::v0_8::Signals;

/// Wraps a `mio`-integrated signal pipe watching only `SIGTERM`.
pub struct ShutdownSignal {
    signals: Signals,
}

impl ShutdownSignal {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            signals: Signals::new([SIGTERM])?,
        })
    }

    pub fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.signals, token, Interest::READABLE)
    }

    /// Drains pending signals, returning `true` if `SIGTERM` was among them.
    pub fn poll_shutdown_requested(&mut self) -> bool {
        self.signals.pending().any(|signal| signal == SIGTERM)
    }
}
