//! Bounded work queue for deferred wake tasks.
//!
//! Enqueueing happens in dispatch context, so the queue is a fixed-capacity
//! `ArrayVec` and never allocates. When it is full the task's pending mark is
//! dropped and the event is absorbed; the next firing schedules it again.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use arrayvec::ArrayVec;
use spin::Mutex;

use crate::platform::WorkScheduler;

use super::task::WakeTask;

/// Maximum number of wake tasks waiting for a worker.
pub const WORK_QUEUE_CAPACITY: usize = 64;

/// Reference [`WorkScheduler`]: a FIFO drained by [`WorkQueue::run_pending`].
pub struct WorkQueue {
    queue: Mutex<ArrayVec<Arc<WakeTask>, WORK_QUEUE_CAPACITY>>,
    /// Accepted length, `1..=WORK_QUEUE_CAPACITY`.
    limit: usize,
    /// Tasks refused because the queue was full.
    dropped: AtomicU64,
}

impl WorkQueue {
    /// Creates a queue accepting up to [`WORK_QUEUE_CAPACITY`] tasks.
    pub fn new() -> Self {
        Self::with_limit(WORK_QUEUE_CAPACITY)
    }

    /// Creates a queue accepting up to `limit` tasks, clamped to the capacity.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            queue: Mutex::new(ArrayVec::new()),
            limit: limit.clamp(1, WORK_QUEUE_CAPACITY),
            dropped: AtomicU64::new(0),
        }
    }

    /// Takes the oldest queued task.
    pub fn pop(&self) -> Option<Arc<WakeTask>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    /// Runs queued tasks until the queue is empty.
    ///
    /// Tasks scheduled while draining are run too. Returns how many tasks
    /// were taken off the queue.
    pub fn run_pending(&self) -> usize {
        let mut taken = 0;
        // The lock is released before each task runs.
        while let Some(task) = self.pop() {
            task.run();
            taken += 1;
        }
        taken
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of tasks refused because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkScheduler for WorkQueue {
    fn schedule(&self, task: Arc<WakeTask>) {
        let refused = {
            let mut queue = self.queue.lock();
            if queue.len() >= self.limit {
                Some(task)
            } else {
                queue.try_push(task).err().map(|err| err.element())
            }
        };

        if let Some(task) = refused {
            warn!("{}: wake work queue full, event dropped", task.device().id());
            task.cancel_pending();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
