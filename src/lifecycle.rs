//! Wake task lifecycle: an atomic state word plus an idle waiter.
//!
//! A deferred wake task can be pending (scheduled, not yet started), running,
//! and retired (its registry entry was removed). All three live in a single
//! `AtomicU32` so that "check retired, then start running" is one CAS: a
//! retire either lands before the CAS and the body never starts, or after it
//! and the retiring thread waits for the body to finish.
//!
//! Layout: `[reserved(29 bits) | retired | running | pending]`

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Observable phase of a wake task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Not scheduled.
    Idle,
    /// Scheduled, waiting for a worker.
    Pending,
    /// Body is executing on a worker.
    Running,
    /// Entry removed; the body will not start again.
    Retired,
}

/// Pending, running and retired bits in one atomic word.
#[derive(Default)]
pub struct TaskState(AtomicU32);

impl TaskState {
    const PENDING: u32 = 1 << 0;
    const RUNNING: u32 = 1 << 1;
    const RETIRED: u32 = 1 << 2;

    /// Creates an idle state.
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Gets the current phase. Running wins over pending, retired over both.
    #[inline]
    pub fn phase(&self) -> TaskPhase {
        let bits = self.0.load(Ordering::Acquire);
        if bits & Self::RETIRED != 0 {
            TaskPhase::Retired
        } else if bits & Self::RUNNING != 0 {
            TaskPhase::Running
        } else if bits & Self::PENDING != 0 {
            TaskPhase::Pending
        } else {
            TaskPhase::Idle
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire) & Self::RUNNING != 0
    }

    /// Sets the pending bit.
    ///
    /// Returns `true` only if the bit was clear and the task is neither
    /// running nor retired, i.e. the caller now owns the duty of enqueueing
    /// it. On a running task the bit is still set, and the running instance
    /// goes again from [`TaskState::end_run`] without being enqueued.
    #[inline]
    pub fn try_mark_pending(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current & (Self::PENDING | Self::RETIRED) != 0 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                current | Self::PENDING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current & Self::RUNNING == 0,
                Err(actual) => current = actual,
            }
        }
    }

    /// Clears the pending bit without running.
    #[inline]
    pub fn clear_pending(&self) {
        self.0.fetch_and(!Self::PENDING, Ordering::AcqRel);
    }

    /// Moves pending to running.
    ///
    /// Fails with the phase that prevented the start. A retired task has its
    /// pending bit dropped; a task already running keeps it so the running
    /// instance picks it up in [`TaskState::end_run`].
    pub fn try_begin_run(&self) -> Result<(), TaskPhase> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current & Self::RETIRED != 0 {
                self.clear_pending();
                return Err(TaskPhase::Retired);
            }
            if current & Self::RUNNING != 0 {
                return Err(TaskPhase::Running);
            }
            if current & Self::PENDING == 0 {
                return Err(TaskPhase::Idle);
            }

            let new_value = (current & !Self::PENDING) | Self::RUNNING;
            match self.0.compare_exchange_weak(
                current,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Clears the running bit.
    ///
    /// Returns `true` if the task was marked pending again while it ran and
    /// has not been retired.
    pub fn end_run(&self) -> bool {
        let previous = self.0.fetch_and(!Self::RUNNING, Ordering::AcqRel);
        previous & Self::PENDING != 0 && previous & Self::RETIRED == 0
    }

    /// Sets the retired bit. Returns `false` if it was already set.
    pub fn retire(&self) -> bool {
        self.0.fetch_or(Self::RETIRED, Ordering::AcqRel) & Self::RETIRED == 0
    }
}

/// Waiter bookkeeping for [`TaskLifecycle::wait_idle`].
///
/// There is no scheduler to park on here, so waiting is cooperative: the
/// caller supplies a relax hook that is invoked between checks.
pub struct WaitQueue {
    /// Number of waiters
    waiters: AtomicUsize,
    /// Whether notified
    notified: AtomicBool,
}

impl WaitQueue {
    /// Create a new wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: AtomicUsize::new(0),
            notified: AtomicBool::new(false),
        }
    }

    /// Waits until `condition` holds, calling `relax` between checks.
    pub fn wait_until<F, R>(&self, mut condition: F, relax: R)
    where
        F: FnMut() -> bool,
        R: Fn(),
    {
        if condition() {
            return;
        }

        self.waiters.fetch_add(1, Ordering::AcqRel);
        loop {
            if condition() {
                self.waiters.fetch_sub(1, Ordering::AcqRel);
                return;
            }

            // Notified, re-check right away.
            if self.notified.swap(false, Ordering::AcqRel) {
                continue;
            }

            relax();
        }
    }

    /// Notify all waiters.
    pub fn notify_all(&self) {
        if self.waiters.load(Ordering::Acquire) > 0 {
            self.notified.store(true, Ordering::Release);
        }
    }

    /// Number of threads currently waiting.
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// State machine of one deferred wake task.
///
/// ```text
///            mark_pending()          begin_run()           end_run()
/// ┌──────┐ ───────────────> ┌─────────┐ ──────────> ┌─────────┐ ─────────> Idle
/// │ Idle │                  │ Pending │             │ Running │
/// └──────┘                  └─────────┘             └─────────┘
///     │ retire()                 │ retire()              │ retire() + wait_idle()
///     └──────────────────────────┴───────────────────────┴──────────> Retired
/// ```
pub struct TaskLifecycle {
    state: TaskState,
    idle_waiters: WaitQueue,
}

impl TaskLifecycle {
    /// Creates an idle lifecycle.
    pub const fn new() -> Self {
        Self {
            state: TaskState::new(),
            idle_waiters: WaitQueue::new(),
        }
    }

    #[inline]
    pub fn phase(&self) -> TaskPhase {
        self.state.phase()
    }

    #[inline]
    pub fn try_mark_pending(&self) -> bool {
        self.state.try_mark_pending()
    }

    #[inline]
    pub fn clear_pending(&self) {
        self.state.clear_pending()
    }

    #[inline]
    pub fn try_begin_run(&self) -> Result<(), TaskPhase> {
        self.state.try_begin_run()
    }

    /// Ends a run and wakes any thread blocked in [`TaskLifecycle::wait_idle`].
    pub fn end_run(&self) -> bool {
        let again = self.state.end_run();
        self.idle_waiters.notify_all();
        again
    }

    /// Prevents any further run from starting.
    pub fn retire(&self) -> bool {
        self.state.retire()
    }

    /// Blocks until no run is in progress.
    pub fn wait_idle<R: Fn()>(&self, relax: R) {
        self.idle_waiters
            .wait_until(|| !self.state.is_running(), relax);
    }
}

impl Default for TaskLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TaskLifecycle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskLifecycle")
            .field("phase", &self.phase())
            .field("waiters", &self.idle_waiters.waiters())
            .finish()
    }
}
