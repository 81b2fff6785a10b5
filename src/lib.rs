//! Event-driven in-memory key-value store served over a small JSON/HTTP
//! protocol. See [`reactor`], [`connection`] and [`dispatch`] for the core
//! request pipeline, and [`store`] for the three backend indexes.

pub mod buffer;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod pool;
pub mod queue;
pub mod reactor;
pub mod signals;
pub mod store;
pub mod timer;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use config::{ARRAY_CAPACITY, HASH_BUCKETS, TREE_CAPACITY};
use dispatch::Engine;
use error::StartupError;
use pool::WorkerPool;
use queue::WorkQueue;
use reactor::Reactor;

pub use config::ServerConfig;

/// Binds the listening socket, spawns the worker pool, and runs the
/// reactor's event loop until `SIGTERM`. Returns once every socket has
/// been closed and every worker thread has joined.
pub fn run(config: ServerConfig) -> Result<(), StartupError> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);

    let engine = Arc::new(Engine::new(ARRAY_CAPACITY, HASH_BUCKETS, TREE_CAPACITY));
    let queue = Arc::new(WorkQueue::new());
    let pool = WorkerPool::new(queue.clone(), config.workers);

    log::info!(
        "listening on {addr} with {} worker{}",
        config.workers,
        if config.workers == 1 { "" } else { "s" }
    );

    let reactor = Reactor::bind(addr, queue, engine)?;
    let result = reactor.run();

    log::info!("reactor stopped, draining work queue");
    pool.shutdown();

    result.map_err(StartupError::Runtime)
}
