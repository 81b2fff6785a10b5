//! Compile-time tunables and the small amount of run-time configuration
//! (the listen port) the server accepts.

use std::time::Duration;

/// Capacity of the array-backed index (`N_A`).
pub const ARRAY_CAPACITY: usize = 1024;

/// Number of buckets in the hash index (`N_H`).
pub const HASH_BUCKETS: usize = 1024;

/// Capacity of the ordered-tree index (`N_R`).
pub const TREE_CAPACITY: usize = 1024;

/// Maximum number of simultaneously live connections.
pub const MAX_FD: usize = 65535;

/// Maximum number of readiness events drained per `poll` wakeup.
pub const MAX_EVENT_NUMBER: usize = 1024;

/// Timer wheel tick interval, in seconds.
pub const TIMESLOT: Duration = Duration::from_secs(5);

/// Idle connections are reaped after this many missed ticks.
pub const IDLE_TICKS: u32 = 3;

/// Default number of worker threads draining the work queue.
pub const DEFAULT_WORKERS: usize = 4;

/// Per-connection read/write buffer starting capacity.
pub const CONNECTION_BUFFER_CAPACITY: usize = 4096;

/// Run-time configuration assembled from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Number of worker threads in the pool.
    pub workers: usize,
}

impl ServerConfig {
    /// Builds a configuration for `port`, using the default worker count.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            workers: DEFAULT_WORKERS,
        }
    }
}
