#![no_std]

//! # PCI Wake Binding
//!
//! This crate binds bus-enumerated PCI devices to their firmware companion
//! objects and dispatches hardware wake events (GPEs) for devices that can
//! wake the system or themselves at runtime.
//! It is designed for `no_std` environments and uses the `alloc` crate for dynamic memory allocation.
//!
//! ## Architecture
//!
//! ### Binding
//! - [`BindController`]: bind/unbind of a device to its companion, shared handler
//!   bookkeeping, routing and power-state application
//! - [`BusScope`] / [`Binder`]: the binder slot a bridge installs on its subordinate
//!   bus so devices behind it bind the same way
//!
//! ### Wake Events
//! - [`EventRegistry`]: one [`WakeEntry`] per wake-capable device, keyed by [`EventKey`]
//! - [`WakeEventHandler`]: dispatch-context callback, one per shared key
//! - [`WakeTask`]: deferred wake work, retired and waited for on unbind
//! - [`WorkQueue`]: bounded, allocation-free reference [`WorkScheduler`]
//!
//! ### Platform Contracts
//! - [`FirmwareOps`], [`GpeController`], [`PowerOps`], [`WorkScheduler`]
//!
//! ## Guarantees
//!
//! - A key's handler is installed iff at least one registry entry uses it
//! - The handler is removed only with the last entry sharing its key
//! - No wake task body runs after its entry has been unbound
//! - `bind`/`unbind` never fail because of wake, routing or power sub-steps
//!
//! ## Examples
//!
//! ```rust,ignore
//! use axpci_wake::{BindController, BusScope, WakeConfig, WorkQueue};
//!
//! let queue = Arc::new(WorkQueue::new());
//! let controller = BindController::new(platform, queue.clone(), WakeConfig::default());
//!
//! // Devices on the root bus bind through the controller.
//! let root = Arc::new(BusScope::new(0, 0));
//! controller.bind_root(&root)?;
//! root.bind_device(&bridge)?;
//!
//! // Devices behind the bridge bind through the same controller.
//! bridge.subordinate().unwrap().bind_device(&nic)?;
//!
//! // Worker context.
//! loop {
//!     queue.run_pending();
//! }
//! ```

extern crate alloc;
#[macro_use]
extern crate log;

mod bind;
mod config;
mod device;
mod firmware;
mod gpe;
mod lifecycle;
mod platform;
mod stats;

pub use bind::BindController;
pub use config::WakeConfig;
pub use device::{Binder, BusScope, DeviceId, PciDevice};
pub use firmware::{
    Companion, EventDomain, EventKey, PowerState, RoutingEntry, RoutingTable, TriggerMode,
};
pub use gpe::{
    EventRegistry, InterruptStatus, RegistrySnapshot, WORK_QUEUE_CAPACITY, WakeEntry,
    WakeEventHandler, WakeTask, WorkQueue,
};
pub use lifecycle::TaskPhase;
pub use platform::{FirmwareOps, GpeController, PowerOps, WakePlatform, WorkScheduler};
pub use stats::WakeStats;

/// Binder used by the firmware namespace walk for root buses.
static GLOBAL_ROOT_BINDER: spin::Once<alloc::sync::Arc<dyn Binder>> = spin::Once::new();

/// Register the global root binder.
///
/// This should be called once, after the bind controller is created. The
/// platform's single [`BindController`] owns the only event registry, so it
/// is the binder to register here. Later calls are ignored.
pub fn register_root_binder(binder: alloc::sync::Arc<dyn Binder>) {
    GLOBAL_ROOT_BINDER.call_once(|| binder);
}

/// Install the global root binder on a newly discovered root bus.
///
/// Returns `false` if no binder has been registered yet.
pub fn attach_root_bus(scope: &BusScope) -> bool {
    if let Some(binder) = GLOBAL_ROOT_BINDER.get() {
        scope.install_binder(binder.clone());
        true
    } else {
        false
    }
}
