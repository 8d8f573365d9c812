//! Deferred wake work for one device.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::device::{BusScope, PciDevice};
use crate::lifecycle::{TaskLifecycle, TaskPhase};
use crate::platform::PowerOps;
use crate::stats::WakeStats;

/// "This device's wake condition fired", to be handled on a worker.
///
/// Scheduling an already pending task is a no-op. Once retired by unbind the
/// body never starts again, and [`WakeTask::retire_and_wait`] returns only
/// after a body already in progress has finished.
pub struct WakeTask {
    device: Arc<PciDevice>,
    ops: Arc<dyn PowerOps>,
    lifecycle: TaskLifecycle,
    /// Walk the subordinate scope of a bridge after waking it.
    propagate: bool,
    stats: Arc<WakeStats>,
}

impl WakeTask {
    /// Creates an idle task for `device`.
    pub fn new(
        device: Arc<PciDevice>,
        ops: Arc<dyn PowerOps>,
        propagate: bool,
        stats: Arc<WakeStats>,
    ) -> Self {
        Self {
            device,
            ops,
            lifecycle: TaskLifecycle::new(),
            propagate,
            stats,
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<PciDevice> {
        &self.device
    }

    #[inline]
    pub fn phase(&self) -> TaskPhase {
        self.lifecycle.phase()
    }

    /// Marks the task pending.
    ///
    /// Returns `true` if the caller must now hand it to a scheduler. A task
    /// that is running is re-armed in place and returns `false`.
    #[inline]
    pub fn mark_pending(&self) -> bool {
        self.lifecycle.try_mark_pending()
    }

    /// Drops a pending mark that could not be queued.
    #[inline]
    pub fn cancel_pending(&self) {
        self.lifecycle.clear_pending();
        self.stats.record_dropped();
    }

    /// Worker entry point.
    pub fn run(&self) {
        loop {
            match self.lifecycle.try_begin_run() {
                Ok(()) => {}
                Err(TaskPhase::Retired) => {
                    trace!("{}: wake task retired before it ran", self.device.id());
                    self.stats.record_skipped();
                    return;
                }
                // Another worker owns it, or a stale queue slot.
                Err(_) => return,
            }

            self.wake_owner();
            self.stats.record_run();

            if !self.lifecycle.end_run() {
                return;
            }
        }
    }

    /// Stops the task from starting again and waits for a running body.
    pub(crate) fn retire_and_wait(&self) {
        self.lifecycle.retire();
        let ops = &self.ops;
        self.lifecycle.wait_idle(|| ops.relax());
    }

    fn wake_owner(&self) {
        let device = &self.device;
        debug!("{}: wake event", device.id());

        match self.ops.check_pme_status(device) {
            Ok(true) => trace!("{}: PME status cleared", device.id()),
            Ok(false) => {}
            Err(err) => warn!("{}: PME status check failed: {:?}", device.id(), err),
        }
        if let Err(err) = self.ops.runtime_resume(device) {
            warn!("{}: runtime resume failed: {:?}", device.id(), err);
        }
        self.ops.notify_power_manager_wake(device);

        if self.propagate {
            if let Some(subordinate) = device.subordinate() {
                self.wake_below(subordinate);
            }
        }
    }

    /// Wakes every device behind `scope` that reports PME, descending through
    /// nested bridges.
    fn wake_below(&self, scope: &Arc<BusScope>) {
        let mut scopes: Vec<Arc<BusScope>> = alloc::vec![Arc::clone(scope)];
        while let Some(scope) = scopes.pop() {
            for child in self.ops.scope_devices(&scope) {
                match self.ops.check_pme_status(&child) {
                    Ok(true) => {
                        self.ops.notify_power_manager_wake(&child);
                        if let Err(err) = self.ops.runtime_resume(&child) {
                            warn!("{}: runtime resume failed: {:?}", child.id(), err);
                        }
                    }
                    Ok(false) => {}
                    Err(err) => warn!("{}: PME status check failed: {:?}", child.id(), err),
                }
                if let Some(subordinate) = child.subordinate() {
                    scopes.push(Arc::clone(subordinate));
                }
            }
        }
    }
}

impl core::fmt::Debug for WakeTask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WakeTask")
            .field("device", &self.device.id())
            .field("lifecycle", &self.lifecycle)
            .field("propagate", &self.propagate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::gpe::testing::{RecordingPower, endpoint};

    fn task_for(device: Arc<PciDevice>, power: &Arc<RecordingPower>, propagate: bool) -> WakeTask {
        WakeTask::new(device, power.clone(), propagate, Arc::new(WakeStats::new()))
    }

    #[test]
    fn test_run_without_pending_does_nothing() {
        let power = Arc::new(RecordingPower::default());
        let task = task_for(endpoint(0, 1, 0), &power, true);
        task.run();
        assert!(power.resumed().is_empty());
    }

    #[test]
    fn test_run_wakes_owner() {
        let power = Arc::new(RecordingPower::default());
        let device = endpoint(0, 1, 0);
        power.set_pme(device.id());
        let task = task_for(device.clone(), &power, true);

        assert!(task.mark_pending());
        assert!(!task.mark_pending());
        task.run();

        assert_eq!(task.phase(), TaskPhase::Idle);
        assert_eq!(power.resumed(), alloc::vec![device.id()]);
        assert_eq!(power.notified(), alloc::vec![device.id()]);
        assert!(!power.has_pme(device.id()));
    }

    #[test]
    fn test_owner_steps_are_best_effort() {
        let power = Arc::new(RecordingPower::default());
        let device = endpoint(0, 1, 0);
        power.fail_pme_check(device.id());
        power.fail_resume(device.id());
        let task = task_for(device.clone(), &power, true);

        task.mark_pending();
        task.run();
        // Both failures are logged; the wake report still goes out.
        assert_eq!(power.notified(), alloc::vec![device.id()]);
    }

    #[test]
    fn test_retired_task_skips_body() {
        let power = Arc::new(RecordingPower::default());
        let stats = Arc::new(WakeStats::new());
        let task = WakeTask::new(endpoint(0, 1, 0), power.clone(), true, stats.clone());

        assert!(task.mark_pending());
        task.retire_and_wait();
        task.run();

        assert!(power.notified().is_empty());
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.runs(), 0);
        assert!(!task.mark_pending());
    }

    #[test]
    fn test_bridge_wake_propagates_to_signalling_children() {
        let power = Arc::new(RecordingPower::default());
        let root = Arc::new(BusScope::new(0, 0));
        let secondary = Arc::new(BusScope::new(0, 1));
        let tertiary = Arc::new(BusScope::new(0, 2));

        let bridge = Arc::new(PciDevice::bridge(
            DeviceId::new(0, 0, 0x1c, 0),
            root,
            secondary.clone(),
        ));
        let quiet = Arc::new(PciDevice::new(DeviceId::new(0, 1, 0, 0), secondary.clone()));
        let inner_bridge = Arc::new(PciDevice::bridge(
            DeviceId::new(0, 1, 1, 0),
            secondary.clone(),
            tertiary.clone(),
        ));
        let deep = Arc::new(PciDevice::new(DeviceId::new(0, 2, 0, 0), tertiary.clone()));

        power.attach(&secondary, quiet.clone());
        power.attach(&secondary, inner_bridge.clone());
        power.attach(&tertiary, deep.clone());
        power.set_pme(deep.id());

        let task = task_for(bridge.clone(), &power, true);
        task.mark_pending();
        task.run();

        let notified = power.notified();
        assert!(notified.contains(&bridge.id()));
        assert!(notified.contains(&deep.id()));
        assert!(!notified.contains(&quiet.id()));
        assert!(!notified.contains(&inner_bridge.id()));
    }

    #[test]
    fn test_propagation_disabled() {
        let power = Arc::new(RecordingPower::default());
        let root = Arc::new(BusScope::new(0, 0));
        let secondary = Arc::new(BusScope::new(0, 1));
        let bridge = Arc::new(PciDevice::bridge(
            DeviceId::new(0, 0, 0x1c, 0),
            root,
            secondary.clone(),
        ));
        let child = Arc::new(PciDevice::new(DeviceId::new(0, 1, 0, 0), secondary.clone()));
        power.attach(&secondary, child.clone());
        power.set_pme(child.id());

        let task = task_for(bridge.clone(), &power, false);
        task.mark_pending();
        task.run();

        assert_eq!(power.notified(), alloc::vec![bridge.id()]);
        assert!(power.has_pme(child.id()));
    }
}
