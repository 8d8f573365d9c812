//! Recording power-ops mock shared by the gpe unit tests.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;

use axerrno::{AxError, AxResult};
use spin::Mutex;

use crate::device::{BusScope, DeviceId, PciDevice};
use crate::firmware::Companion;
use crate::platform::PowerOps;

#[derive(Default)]
pub(crate) struct RecordingPower {
    pme: Mutex<BTreeSet<DeviceId>>,
    pme_failures: Mutex<BTreeSet<DeviceId>>,
    resume_failures: Mutex<BTreeSet<DeviceId>>,
    resumed: Mutex<Vec<DeviceId>>,
    notified: Mutex<Vec<DeviceId>>,
    scopes: Mutex<BTreeMap<u8, Vec<Arc<PciDevice>>>>,
}

impl RecordingPower {
    pub(crate) fn set_pme(&self, id: DeviceId) {
        self.pme.lock().insert(id);
    }

    pub(crate) fn has_pme(&self, id: DeviceId) -> bool {
        self.pme.lock().contains(&id)
    }

    pub(crate) fn fail_pme_check(&self, id: DeviceId) {
        self.pme_failures.lock().insert(id);
    }

    pub(crate) fn fail_resume(&self, id: DeviceId) {
        self.resume_failures.lock().insert(id);
    }

    pub(crate) fn resumed(&self) -> Vec<DeviceId> {
        self.resumed.lock().clone()
    }

    pub(crate) fn notified(&self) -> Vec<DeviceId> {
        self.notified.lock().clone()
    }

    pub(crate) fn attach(&self, scope: &BusScope, device: Arc<PciDevice>) {
        self.scopes
            .lock()
            .entry(scope.number())
            .or_default()
            .push(device);
    }
}

impl PowerOps for RecordingPower {
    fn add_pm_notifier(&self, _companion: &Companion, _device: &PciDevice) -> AxResult {
        Ok(())
    }

    fn remove_pm_notifier(&self, _companion: &Companion) {}

    fn set_runtime_wake_eligible(&self, _device: &PciDevice, _eligible: bool) {}

    fn check_pme_status(&self, device: &PciDevice) -> AxResult<bool> {
        if self.pme_failures.lock().contains(&device.id()) {
            return Err(AxError::Io);
        }
        Ok(self.pme.lock().remove(&device.id()))
    }

    fn runtime_resume(&self, device: &PciDevice) -> AxResult {
        if self.resume_failures.lock().contains(&device.id()) {
            return Err(AxError::BadState);
        }
        self.resumed.lock().push(device.id());
        Ok(())
    }

    fn notify_power_manager_wake(&self, device: &PciDevice) {
        self.notified.lock().push(device.id());
    }

    fn scope_devices(&self, scope: &BusScope) -> Vec<Arc<PciDevice>> {
        self.scopes
            .lock()
            .get(&scope.number())
            .cloned()
            .unwrap_or_default()
    }
}

/// An endpoint at `bus:slot.function` on its own bus scope.
pub(crate) fn endpoint(bus: u8, slot: u8, function: u8) -> Arc<PciDevice> {
    let scope = Arc::new(BusScope::new(0, bus));
    Arc::new(PciDevice::new(DeviceId::new(0, bus, slot, function), scope))
}
