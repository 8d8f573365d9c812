//! Wake-path statistics.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counters for the wake-event path, shared by the controller, its handlers
/// and its tasks.
#[derive(Debug, Default)]
pub struct WakeStats {
    /// Handler invocations from the event controller.
    pub dispatch_count: AtomicU64,
    /// Tasks moved from idle to pending by a dispatch.
    pub scheduled_count: AtomicU64,
    /// Task bodies run to completion.
    pub run_count: AtomicU64,
    /// Queued tasks that found themselves retired and did not run.
    pub skipped_count: AtomicU64,
    /// Pending marks dropped because the scheduler refused the task.
    pub dropped_count: AtomicU64,
    /// Shared handlers installed.
    pub install_count: AtomicU64,
    /// Shared handlers removed.
    pub removal_count: AtomicU64,
}

impl WakeStats {
    /// Creates a new statistics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_dispatch(&self) {
        self.dispatch_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_scheduled(&self) {
        self.scheduled_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_run(&self) {
        self.run_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_install(&self) {
        self.install_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_removal(&self) {
        self.removal_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dispatches(&self) -> u64 {
        self.dispatch_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn scheduled(&self) -> u64 {
        self.scheduled_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn runs(&self) -> u64 {
        self.run_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn installs(&self) -> u64 {
        self.install_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn removals(&self) -> u64 {
        self.removal_count.load(Ordering::Relaxed)
    }

    /// Handlers currently installed according to these counters.
    #[inline]
    pub fn live_handlers(&self) -> u64 {
        self.installs().saturating_sub(self.removals())
    }
}
