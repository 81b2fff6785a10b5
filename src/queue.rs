//! Blocking MPMC work queue feeding the worker pool (C1).
//!
//! Two internal FIFOs reduce producer/consumer contention: producers only
//! ever touch `producer`, consumers only ever touch `consumer`. A consumer
//! that finds its own FIFO empty takes the producer lock, waits on the
//! condition variable, then swaps the two queues. Strict FIFO ordering only
//! holds within one swap epoch: everything enqueued before a swap is
//! served before anything enqueued after it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A unit of work dispatched to a worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Producer {
    queue: VecDeque<Task>,
}

/// Blocking, cancellable FIFO work queue shared by the reactor and the
/// worker pool.
pub struct WorkQueue {
    producer: Mutex<Producer>,
    consumer: Mutex<VecDeque<Task>>,
    cond: Condvar,
    cancelled: AtomicBool,
}

impl WorkQueue {
    /// Creates an empty, non-cancelled queue.
    pub fn new() -> Self {
        Self {
            producer: Mutex::new(Producer {
                queue: VecDeque::new(),
            }),
            consumer: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Appends `task`. Never blocks. Dropped silently once the queue has
    /// been [`cancel`](Self::cancel)ed; callers needing to know a task was
    /// refused should check [`is_cancelled`](Self::is_cancelled) first.
    pub fn push(&self, task: Task) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }

        let mut producer = self.producer.lock().unwrap();
        producer.queue.push_back(task);
        drop(producer);
        self.cond.notify_one();
    }

    /// Returns whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Blocks until a task is available or the queue has been cancelled and
    /// drained, in which case `None` is returned.
    pub fn pop(&self) -> Option<Task> {
        loop {
            {
                let mut consumer = self.consumer.lock().unwrap();
                if let Some(task) = consumer.pop_front() {
                    return Some(task);
                }
            }

            let mut producer = self.producer.lock().unwrap();
            while producer.queue.is_empty() && !self.cancelled.load(Ordering::Acquire) {
                producer = self.cond.wait(producer).unwrap();
            }

            let mut consumer = self.consumer.lock().unwrap();
            std::mem::swap(&mut producer.queue, &mut *consumer);
            drop(producer);

            if let Some(task) = consumer.pop_front() {
                return Some(task);
            }

            if self.cancelled.load(Ordering::Acquire) {
                return None;
            }
        }
    }

    /// Sets the sticky cancellation flag and wakes every waiter. Further
    /// pushes are silently dropped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.cond.notify_all();
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
