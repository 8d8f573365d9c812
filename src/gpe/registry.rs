//! Registry of wake-event listeners.
//!
//! Writers (bind/unbind) serialize on a write lock held only across the list
//! swap. The dispatch path takes the read lock just long enough to clone an
//! `Arc` to the current list and then iterates without any lock, so it never
//! waits behind a writer doing real work.

use alloc::sync::Arc;
use alloc::vec::Vec;

use axerrno::{AxError, AxResult, ax_err};
use spin::RwLock;

use crate::device::{DeviceId, PciDevice};
use crate::firmware::EventKey;

use super::task::WakeTask;

/// One device listening on one wake event.
#[derive(Debug)]
pub struct WakeEntry {
    device: Arc<PciDevice>,
    key: EventKey,
    task: Arc<WakeTask>,
}

impl WakeEntry {
    /// Creates an entry for `device` on `key`.
    pub fn new(device: Arc<PciDevice>, key: EventKey, task: Arc<WakeTask>) -> Self {
        Self { device, key, task }
    }

    #[inline]
    pub fn device(&self) -> &Arc<PciDevice> {
        &self.device
    }

    #[inline]
    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    #[inline]
    pub fn key(&self) -> EventKey {
        self.key
    }

    #[inline]
    pub fn task(&self) -> &Arc<WakeTask> {
        &self.task
    }
}

/// Immutable view of the registry at one point in time.
pub type RegistrySnapshot = Arc<Vec<Arc<WakeEntry>>>;

/// Wake-event listeners, at most one per device.
///
/// Iteration order is insertion order.
pub struct EventRegistry {
    entries: RwLock<RegistrySnapshot>,
    #[cfg(test)]
    fail_next_reserve: core::sync::atomic::AtomicBool,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            #[cfg(test)]
            fail_next_reserve: core::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Makes the next [`EventRegistry::add`] fail as if out of memory.
    #[cfg(test)]
    pub(crate) fn fail_next_reserve(&self) {
        self.fail_next_reserve
            .store(true, core::sync::atomic::Ordering::Relaxed);
    }

    /// Adds `entry`.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the device already has an entry.
    /// - `NoMemory` if the new list cannot be allocated.
    pub fn add(&self, entry: Arc<WakeEntry>) -> AxResult {
        let mut entries = self.entries.write();

        if entries.iter().any(|e| e.device_id() == entry.device_id()) {
            return ax_err!(AlreadyExists, "device already has a wake entry");
        }

        #[cfg(test)]
        if self
            .fail_next_reserve
            .swap(false, core::sync::atomic::Ordering::Relaxed)
        {
            return Err(AxError::NoMemory);
        }

        // Readers may still hold the current list, so build a fresh one.
        let mut next = Vec::new();
        next.try_reserve_exact(entries.len() + 1)
            .map_err(|_| AxError::NoMemory)?;
        next.extend(entries.iter().cloned());
        next.push(entry);
        *entries = Arc::new(next);

        Ok(())
    }

    /// Removes and returns the entry owned by `device`, if any.
    pub fn remove(&self, device: DeviceId) -> Option<Arc<WakeEntry>> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|e| e.device_id() == device)?;
        Some(Arc::make_mut(&mut *entries).remove(index))
    }

    /// Number of entries currently listening on `key`.
    ///
    /// Called after removing an entry, zero means the removed entry was the
    /// last sharer of the key.
    pub fn count_sharing(&self, key: EventKey) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.key() == key)
            .count()
    }

    /// Returns the current list without holding the lock afterwards.
    #[inline]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.entries.read().clone()
    }

    /// Gets the entry owned by `device`.
    pub fn get(&self, device: DeviceId) -> Option<Arc<WakeEntry>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.device_id() == device)
            .cloned()
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.get(device).is_some()
    }

    /// Lists the devices with an entry.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.entries.read().iter().map(|e| e.device_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::EventDomain;
    use crate::gpe::testing::{RecordingPower, endpoint};
    use crate::stats::WakeStats;

    fn entry(slot: u8, key: EventKey) -> Arc<WakeEntry> {
        let device = endpoint(0, slot, 0);
        let power = Arc::new(RecordingPower::default());
        let task = Arc::new(WakeTask::new(
            device.clone(),
            power,
            true,
            Arc::new(WakeStats::new()),
        ));
        Arc::new(WakeEntry::new(device, key, task))
    }

    #[test]
    fn test_registry_add_and_count() {
        let registry = EventRegistry::new();
        let key = EventKey::new(EventDomain(5), 3);
        let other = EventKey::new(EventDomain(5), 4);

        registry.add(entry(1, key)).unwrap();
        registry.add(entry(2, key)).unwrap();
        registry.add(entry(3, other)).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.count_sharing(key), 2);
        assert_eq!(registry.count_sharing(other), 1);
        assert_eq!(
            registry.count_sharing(EventKey::new(EventDomain(6), 3)),
            0
        );
    }

    #[test]
    fn test_registry_rejects_second_entry_for_device() {
        let registry = EventRegistry::new();
        let key = EventKey::new(EventDomain(5), 3);

        registry.add(entry(1, key)).unwrap();
        assert_eq!(registry.add(entry(1, key)), Err(AxError::AlreadyExists));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_remove() {
        let registry = EventRegistry::new();
        let key = EventKey::new(EventDomain(5), 3);
        let first = entry(1, key);
        let id = first.device_id();

        registry.add(first).unwrap();
        registry.add(entry(2, key)).unwrap();

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.device_id(), id);
        assert!(!registry.contains(id));
        assert_eq!(registry.count_sharing(key), 1);

        // Absent device: not an error.
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_snapshot_is_stable_across_mutation() {
        let registry = EventRegistry::new();
        let key = EventKey::new(EventDomain(5), 3);
        let first = entry(1, key);
        let id = first.device_id();
        registry.add(first).unwrap();

        let snapshot = registry.snapshot();
        registry.remove(id).unwrap();
        registry.add(entry(2, key)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].device_id(), id);
        assert_eq!(registry.devices(), alloc::vec![DeviceId::new(0, 0, 2, 0)]);
    }
}
