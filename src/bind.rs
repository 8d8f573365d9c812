//! Binding of enumerated devices to their firmware companions.
//!
//! # Bind
//!
//! 1. Resolve the companion; a device without one is left alone.
//! 2. Link device and companion for PM notifications.
//! 3. For a wake-capable companion, register a wake entry, installing the
//!    shared handler if this is the first device on the key, and arm
//!    `run_wake`.
//! 4. Mark the device runtime-wake eligible if `run_wake` is set.
//! 5. For a bridge, install this controller as the binder of its subordinate
//!    scope.
//! 6. Apply the inferred power state and the routing table, if any.
//!
//! # Unbind
//!
//! Reverses the above. The wake entry and, if it was the last sharer, the
//! shared handler are removed under the registration lock; only then does
//! unbind wait for a running wake task, with no lock held.
//!
//! Every sub-step is best-effort. Enumeration must not stall on wakeup
//! setup, so failures are logged and `bind`/`unbind` still succeed.

use alloc::sync::{Arc, Weak};

use axerrno::AxResult;
use spin::Mutex;

use crate::config::WakeConfig;
use crate::device::{Binder, BusScope, PciDevice};
use crate::firmware::{Companion, EventKey};
use crate::gpe::{EventRegistry, WakeEntry, WakeEventHandler, WakeTask};
use crate::platform::{PowerOps, WakePlatform, WorkScheduler};
use crate::stats::WakeStats;

/// Binds devices to firmware companions and manages their shared wake
/// handlers.
///
/// The controller owns the event registry, so one controller is expected per
/// platform: two controllers listening on the same key would each install a
/// handler for it.
pub struct BindController<P: WakePlatform> {
    platform: Arc<P>,
    scheduler: Arc<dyn WorkScheduler>,
    registry: Arc<EventRegistry>,
    config: WakeConfig,
    stats: Arc<WakeStats>,
    /// Serializes registry updates with handler install/remove so that the
    /// sharing count and the installed handlers always agree.
    registration: Mutex<()>,
    /// Handed to bridge scopes as their binder.
    this: Weak<Self>,
}

impl<P: WakePlatform + 'static> BindController<P> {
    /// Creates a controller with an empty registry.
    pub fn new(
        platform: Arc<P>,
        scheduler: Arc<dyn WorkScheduler>,
        config: WakeConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            platform,
            scheduler,
            registry: Arc::new(EventRegistry::new()),
            config,
            stats: Arc::new(WakeStats::new()),
            registration: Mutex::new(()),
            this: this.clone(),
        })
    }

    #[inline]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    #[inline]
    pub fn stats(&self) -> &Arc<WakeStats> {
        &self.stats
    }

    #[inline]
    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    #[inline]
    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Installs this controller as the binder of a root bus scope.
    pub fn bind_root(&self, scope: &BusScope) -> AxResult {
        if let Some(binder) = self.binder() {
            debug!("bus {:04x}:{:02x}: root binder installed", scope.segment(), scope.number());
            scope.install_binder(binder);
        }
        Ok(())
    }

    fn binder(&self) -> Option<Arc<dyn Binder>> {
        self.this.upgrade().map(|this| this as Arc<dyn Binder>)
    }

    fn bind_device(&self, device: &Arc<PciDevice>) -> AxResult {
        let Some(companion) = self.platform.resolve_companion(device) else {
            trace!("{}: no firmware companion", device.id());
            return Ok(());
        };

        if let Err(err) = self.platform.add_pm_notifier(&companion, device) {
            warn!("{}: PM notifier not installed: {:?}", device.id(), err);
        }

        if let Some(key) = companion.wakeup() {
            if self.register_wake(device, key) {
                companion.set_run_wake(true);
            }
        }

        if companion.run_wake() {
            self.platform.set_runtime_wake_eligible(device, true);
        }

        if let Some(subordinate) = device.subordinate() {
            debug!("{}: PCI bridge, binding bus {:02x}", device.id(), subordinate.number());
            if let Some(binder) = self.binder() {
                subordinate.install_binder(binder);
            }
        }

        let state = self.platform.infer_power_state(&companion);
        if let Err(err) = self.platform.apply_power_transition(&companion, state) {
            warn!("{}: transition to {:?} failed: {:?}", device.id(), state, err);
        }

        if self.config.apply_routing {
            self.add_routing(device, &companion);
        }

        Ok(())
    }

    fn unbind_device(&self, device: &Arc<PciDevice>) -> AxResult {
        let Some(companion) = self.platform.resolve_companion(device) else {
            return Ok(());
        };

        if companion.is_wake_capable() {
            self.unregister_wake(device);
        }

        self.platform.set_runtime_wake_eligible(device, false);
        self.platform.remove_pm_notifier(&companion);

        if let Some(subordinate) = device.subordinate() {
            if self.config.apply_routing {
                self.platform.remove_routing(subordinate);
            }
            subordinate.clear_binder();
        }

        Ok(())
    }

    /// Registers `device` on `key`. Returns `false` if the device ends up
    /// without wake support.
    fn register_wake(&self, device: &Arc<PciDevice>, key: EventKey) -> bool {
        let task = Arc::new(WakeTask::new(
            Arc::clone(device),
            Arc::clone(&self.platform) as Arc<dyn PowerOps>,
            self.config.propagate_wake,
            Arc::clone(&self.stats),
        ));
        let entry = Arc::new(WakeEntry::new(Arc::clone(device), key, task));

        let _guard = self.registration.lock();

        let first = self.registry.count_sharing(key) == 0;
        if first {
            if let Err(err) = self.install_handler(key) {
                warn!("{}: {} handler not installed: {:?}", device.id(), key, err);
                return false;
            }
        }

        if let Err(err) = self.registry.add(entry) {
            warn!("{}: wake registration failed: {:?}", device.id(), err);
            if first {
                self.remove_handler(key);
            }
            return false;
        }

        trace!("{}: listening on {}", device.id(), key);
        true
    }

    fn unregister_wake(&self, device: &PciDevice) {
        let removed = {
            let _guard = self.registration.lock();
            let removed = self.registry.remove(device.id());
            if let Some(entry) = &removed {
                if self.registry.count_sharing(entry.key()) == 0 {
                    self.remove_handler(entry.key());
                }
            }
            removed
        };

        // No lock may be held while waiting on the task.
        if let Some(entry) = removed {
            entry.task().retire_and_wait();
            trace!("{}: stopped listening on {}", device.id(), entry.key());
        }
    }

    fn install_handler(&self, key: EventKey) -> AxResult {
        let handler = Arc::new(WakeEventHandler::new(
            key,
            Arc::clone(&self.registry),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.stats),
        ));
        self.platform
            .install_event_handler(key, self.config.trigger_mode, handler)?;
        self.stats.record_install();
        debug!("{}: handler installed", key);

        if let Err(err) = self.platform.set_wake_capable(key) {
            warn!("{}: not marked wake-capable: {:?}", key, err);
        }
        Ok(())
    }

    fn remove_handler(&self, key: EventKey) {
        match self.platform.remove_event_handler(key) {
            Ok(()) => {
                self.stats.record_removal();
                debug!("{}: handler removed", key);
            }
            Err(err) => warn!("{}: handler removal failed: {:?}", key, err),
        }
    }

    /// Registers the companion's routing table against the bridge's
    /// subordinate bus, or the device's own bus for a non-bridge.
    fn add_routing(&self, device: &PciDevice, companion: &Companion) {
        let Some(table) = self.platform.resolve_routing_table(companion) else {
            return;
        };
        let scope = device.subordinate().unwrap_or(device.bus());
        if let Err(err) = self.platform.apply_routing(scope, table) {
            warn!(
                "{}: routing for bus {:02x} not applied: {:?}",
                companion.path(),
                scope.number(),
                err
            );
        }
    }
}

impl<P: WakePlatform + 'static> Binder for BindController<P> {
    fn bind(&self, device: &Arc<PciDevice>) -> AxResult {
        self.bind_device(device)
    }

    fn unbind(&self, device: &Arc<PciDevice>) -> AxResult {
        self.unbind_device(device)
    }
}
