//! Dispatch-context handler for a shared wake event.

use alloc::sync::Arc;

use crate::firmware::EventKey;
use crate::platform::WorkScheduler;
use crate::stats::WakeStats;

use super::registry::EventRegistry;

/// Result reported back to the event controller.
///
/// A wake handler claims every firing of its key, so consumption is the only
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptStatus {
    /// The event was consumed.
    Handled,
}

/// Handler installed once per event key and shared by every device on it.
///
/// Runs in the event controller's dispatch context: it only marks tasks
/// pending and hands them to the scheduler. It never takes the bind
/// controller's registration lock and never waits on a task.
pub struct WakeEventHandler {
    /// Key this handler was installed for; the controller's dispatch token.
    key: EventKey,
    registry: Arc<EventRegistry>,
    scheduler: Arc<dyn WorkScheduler>,
    stats: Arc<WakeStats>,
}

impl WakeEventHandler {
    /// Creates a handler for `key`.
    pub fn new(
        key: EventKey,
        registry: Arc<EventRegistry>,
        scheduler: Arc<dyn WorkScheduler>,
        stats: Arc<WakeStats>,
    ) -> Self {
        Self {
            key,
            registry,
            scheduler,
            stats,
        }
    }

    #[inline]
    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Schedules the wake task of every device listening on this key.
    ///
    /// Always reports [`InterruptStatus::Handled`]; the work itself happens
    /// later on a worker.
    pub fn handle(&self) -> InterruptStatus {
        self.stats.record_dispatch();

        let snapshot = self.registry.snapshot();
        for entry in snapshot.iter().filter(|e| e.key() == self.key) {
            if entry.task().mark_pending() {
                trace!("{}: scheduling wake task for {}", self.key, entry.device_id());
                self.stats.record_scheduled();
                self.scheduler.schedule(Arc::clone(entry.task()));
            }
        }

        InterruptStatus::Handled
    }
}

impl core::fmt::Debug for WakeEventHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WakeEventHandler")
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::EventDomain;
    use crate::gpe::testing::{RecordingPower, endpoint};
    use crate::gpe::{WakeEntry, WakeTask, WorkQueue};
    use crate::lifecycle::TaskPhase;

    struct Fixture {
        registry: Arc<EventRegistry>,
        queue: Arc<WorkQueue>,
        power: Arc<RecordingPower>,
        stats: Arc<WakeStats>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(EventRegistry::new()),
                queue: Arc::new(WorkQueue::new()),
                power: Arc::new(RecordingPower::default()),
                stats: Arc::new(WakeStats::new()),
            }
        }

        fn register(&self, slot: u8, key: EventKey) -> Arc<WakeEntry> {
            let device = endpoint(0, slot, 0);
            let task = Arc::new(WakeTask::new(
                device.clone(),
                self.power.clone(),
                true,
                self.stats.clone(),
            ));
            let entry = Arc::new(WakeEntry::new(device, key, task));
            self.registry.add(entry.clone()).unwrap();
            entry
        }

        fn handler(&self, key: EventKey) -> WakeEventHandler {
            WakeEventHandler::new(
                key,
                self.registry.clone(),
                self.queue.clone(),
                self.stats.clone(),
            )
        }
    }

    #[test]
    fn test_handler_with_no_entries_is_noop() {
        let fixture = Fixture::new();
        let handler = fixture.handler(EventKey::new(EventDomain(5), 3));

        assert_eq!(handler.handle(), InterruptStatus::Handled);
        assert!(fixture.queue.is_empty());
        assert_eq!(fixture.stats.dispatches(), 1);
        assert_eq!(fixture.stats.scheduled(), 0);
    }

    #[test]
    fn test_handler_schedules_matching_entries_only() {
        let fixture = Fixture::new();
        let key = EventKey::new(EventDomain(5), 3);
        let a = fixture.register(1, key);
        let b = fixture.register(2, key);
        let other_domain = fixture.register(3, EventKey::new(EventDomain(6), 3));

        fixture.handler(key).handle();

        assert_eq!(fixture.queue.len(), 2);
        assert_eq!(a.task().phase(), TaskPhase::Pending);
        assert_eq!(b.task().phase(), TaskPhase::Pending);
        assert_eq!(other_domain.task().phase(), TaskPhase::Idle);
    }

    #[test]
    fn test_repeated_fire_before_run_schedules_once() {
        let fixture = Fixture::new();
        let key = EventKey::new(EventDomain(5), 3);
        let a = fixture.register(1, key);
        let handler = fixture.handler(key);

        handler.handle();
        handler.handle();
        handler.handle();
        assert_eq!(fixture.queue.len(), 1);
        assert_eq!(fixture.stats.scheduled(), 1);

        assert_eq!(fixture.queue.run_pending(), 1);
        assert_eq!(fixture.power.notified(), alloc::vec![a.device_id()]);

        // Idle again, so the next fire schedules it again.
        handler.handle();
        assert_eq!(fixture.queue.len(), 1);
    }
}
