//! Contracts this crate consumes from the rest of the platform.
//!
//! Firmware evaluation, the event controller, the power-management core and
//! the worker pool are all external. Each is reached through one narrow trait
//! so that the bind and wake paths can be exercised against mocks.

use alloc::sync::Arc;
use alloc::vec::Vec;

use axerrno::AxResult;

use crate::device::{BusScope, PciDevice};
use crate::firmware::{Companion, EventKey, PowerState, RoutingTable, TriggerMode};
use crate::gpe::{WakeEventHandler, WakeTask};

/// Firmware namespace queries and power-resource control.
pub trait FirmwareOps: Send + Sync {
    /// Finds the firmware companion of `device`, if firmware describes one.
    fn resolve_companion(&self, device: &PciDevice) -> Option<Arc<Companion>>;

    /// Evaluates the companion's interrupt-routing table, if it has one.
    fn resolve_routing_table(&self, companion: &Companion) -> Option<RoutingTable>;

    /// Registers `table` against `scope`.
    fn apply_routing(&self, scope: &BusScope, table: RoutingTable) -> AxResult;

    /// Drops every routing entry previously registered for `scope`.
    fn remove_routing(&self, scope: &BusScope);

    /// Infers the companion's current power state from its power resources.
    fn infer_power_state(&self, companion: &Companion) -> PowerState;

    /// Moves the companion into `state`.
    fn apply_power_transition(&self, companion: &Companion, state: PowerState) -> AxResult;
}

/// The wake-event (GPE) controller.
pub trait GpeController: Send + Sync {
    /// Installs `handler` for `key`.
    ///
    /// The controller invokes [`WakeEventHandler::handle`] from its dispatch
    /// context every time the event fires.
    fn install_event_handler(
        &self,
        key: EventKey,
        trigger: TriggerMode,
        handler: Arc<WakeEventHandler>,
    ) -> AxResult;

    /// Removes the handler installed for `key`.
    fn remove_event_handler(&self, key: EventKey) -> AxResult;

    /// Marks `key` as usable for wakeup at the controller level.
    fn set_wake_capable(&self, key: EventKey) -> AxResult;
}

/// Power-management core and bus-level device access.
pub trait PowerOps: Send + Sync {
    /// Links `device` and `companion` for firmware PM notifications.
    fn add_pm_notifier(&self, companion: &Companion, device: &PciDevice) -> AxResult;

    /// Detaches the PM notifier installed by [`PowerOps::add_pm_notifier`].
    fn remove_pm_notifier(&self, companion: &Companion);

    /// Marks `device` as (in)eligible for runtime wakeup.
    fn set_runtime_wake_eligible(&self, device: &PciDevice, eligible: bool);

    /// Checks the device's PME status and clears it.
    ///
    /// Returns `true` if the device had signalled a wake.
    fn check_pme_status(&self, device: &PciDevice) -> AxResult<bool>;

    /// Resumes `device` from a runtime low-power state.
    fn runtime_resume(&self, device: &PciDevice) -> AxResult;

    /// Reports a wakeup event for `device` to the PM core.
    fn notify_power_manager_wake(&self, device: &PciDevice);

    /// Lists the devices currently enumerated within `scope`.
    fn scope_devices(&self, scope: &BusScope) -> Vec<Arc<PciDevice>>;

    /// Called repeatedly while unbind waits for a running wake task.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

/// Worker pool running deferred wake tasks outside the dispatch context.
pub trait WorkScheduler: Send + Sync {
    /// Enqueues `task`. Must not block.
    ///
    /// An implementation that cannot accept the task must call
    /// [`WakeTask::cancel_pending`] so a later event can schedule it again.
    fn schedule(&self, task: Arc<WakeTask>);
}

/// Everything the bind controller needs from the platform.
pub trait WakePlatform: FirmwareOps + GpeController + PowerOps {}

impl<T: FirmwareOps + GpeController + PowerOps> WakePlatform for T {}
