//! Fixed-size worker pool draining the work queue (C2).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::queue::WorkQueue;

/// A pool of worker threads that pull [`Task`](crate::queue::Task)s off a
/// shared [`WorkQueue`] until the queue is cancelled.
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` worker threads pulling from `queue`.
    pub fn new(queue: Arc<WorkQueue>, size: usize) -> Self {
        let mut handles = Vec::with_capacity(size);

        for id in 0..size {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("kvnode-worker-{id}"))
                .spawn(move || worker_loop(id, &queue))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self { queue, handles }
    }

    /// Cancels the queue and joins every worker thread.
    pub fn shutdown(self) {
        self.queue.cancel();
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, queue: &WorkQueue) {
    debug!("worker {id} started");
    while let Some(task) = queue.pop() {
        // A single misbehaving command handler must not take the worker
        // offline; swallow the panic and keep draining the queue.
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("worker {id} caught a panicking task");
        }
    }
    debug!("worker {id} exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_queued_task() {
        let queue = Arc::new(WorkQueue::new());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter = counter.clone();
            queue.push(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let pool = WorkerPool::new(queue, 4);
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let queue = Arc::new(WorkQueue::new());
        let counter = Arc::new(AtomicUsize::new(0));

        queue.push(Box::new(|| panic!("boom")));
        for _ in 0..10 {
            let counter = counter.clone();
            queue.push(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let pool = WorkerPool::new(queue, 1);
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
