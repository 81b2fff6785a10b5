//! Crate-wide error type for fatal, process-ending failures.
//!
//! Per-request and per-connection failures never reach this type: they are
//! encoded as `Status` values (see [`crate::store`]) or close the offending
//! connection without propagating further (see [`crate::reactor`]).

use std::fmt;
use std::io;

/// Failure that should abort the process with a non-zero exit code.
#[derive(Debug)]
pub enum StartupError {
    /// Binding the listening socket failed.
    Bind(io::Error),
    /// Registering the listening socket with the readiness notifier failed.
    Poll(io::Error),
    /// Installing the signal handlers failed.
    Signal(io::Error),
    /// The reactor's poll loop returned a fatal I/O error.
    Runtime(io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "failed to bind listening socket: {e}"),
            Self::Poll(e) => write!(f, "failed to register with readiness notifier: {e}"),
            Self::Signal(e) => write!(f, "failed to install signal handlers: {e}"),
            Self::Runtime(e) => write!(f, "reactor loop failed: {e}"),
        }
    }
}

impl std::error::Error for StartupError {}
