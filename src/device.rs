//! Bus-enumerated devices, their bus scopes, and the binder slot a bridge
//! exposes to its subordinate scope.

use alloc::sync::Arc;
use core::fmt;

use axerrno::AxResult;
use spin::RwLock;

/// Bus address of a device: `segment:bus:slot.function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    pub segment: u16,
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
}

impl DeviceId {
    /// Creates a device address. `slot` is masked to 5 bits, `function` to 3.
    pub const fn new(segment: u16, bus: u8, slot: u8, function: u8) -> Self {
        Self {
            segment,
            bus,
            slot: slot & 0x1f,
            function: function & 0x07,
        }
    }

    /// Packed device/function byte.
    #[inline]
    pub const fn devfn(&self) -> u8 {
        (self.slot << 3) | self.function
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.segment, self.bus, self.slot, self.function
        )
    }
}

/// Bind/unbind capability installed on a bus scope.
///
/// Devices discovered within a scope are bound through whatever binder the
/// scope carries. A bridge installs its own controller here so that devices
/// behind it bind the same way it did.
pub trait Binder: Send + Sync {
    /// Binds `device` to its firmware companion.
    fn bind(&self, device: &Arc<PciDevice>) -> AxResult;
    /// Reverses [`Binder::bind`].
    fn unbind(&self, device: &Arc<PciDevice>) -> AxResult;
}

/// A bus segment: either a root bus or the subordinate bus of a bridge.
pub struct BusScope {
    segment: u16,
    number: u8,
    binder: RwLock<Option<Arc<dyn Binder>>>,
}

impl BusScope {
    /// Creates a bus scope with no binder installed.
    pub fn new(segment: u16, number: u8) -> Self {
        Self {
            segment,
            number,
            binder: RwLock::new(None),
        }
    }

    #[inline]
    pub fn segment(&self) -> u16 {
        self.segment
    }

    #[inline]
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Installs `binder` as the entry point for devices in this scope.
    pub fn install_binder(&self, binder: Arc<dyn Binder>) {
        *self.binder.write() = Some(binder);
    }

    /// Removes the installed binder, returning it.
    pub fn clear_binder(&self) -> Option<Arc<dyn Binder>> {
        self.binder.write().take()
    }

    pub fn has_binder(&self) -> bool {
        self.binder.read().is_some()
    }

    /// Binds a device discovered in this scope.
    ///
    /// Succeeds without doing anything when no binder is installed.
    pub fn bind_device(&self, device: &Arc<PciDevice>) -> AxResult {
        // Clone out so the lock is not held across the bind.
        let binder = self.binder.read().clone();
        match binder {
            Some(binder) => binder.bind(device),
            None => Ok(()),
        }
    }

    /// Unbinds a device leaving this scope.
    pub fn unbind_device(&self, device: &Arc<PciDevice>) -> AxResult {
        let binder = self.binder.read().clone();
        match binder {
            Some(binder) => binder.unbind(device),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for BusScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusScope")
            .field("segment", &self.segment)
            .field("number", &self.number)
            .field("has_binder", &self.has_binder())
            .finish()
    }
}

/// An enumerated PCI device. Read-only to this crate.
#[derive(Debug)]
pub struct PciDevice {
    id: DeviceId,
    /// The bus the device sits on.
    bus: Arc<BusScope>,
    /// Secondary bus, present only for bridges.
    subordinate: Option<Arc<BusScope>>,
}

impl PciDevice {
    /// Creates an endpoint device on `bus`.
    pub fn new(id: DeviceId, bus: Arc<BusScope>) -> Self {
        Self {
            id,
            bus,
            subordinate: None,
        }
    }

    /// Creates a bridge on `bus` forwarding to `subordinate`.
    pub fn bridge(id: DeviceId, bus: Arc<BusScope>, subordinate: Arc<BusScope>) -> Self {
        Self {
            id,
            bus,
            subordinate: Some(subordinate),
        }
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    #[inline]
    pub fn bus(&self) -> &Arc<BusScope> {
        &self.bus
    }

    #[inline]
    pub fn subordinate(&self) -> Option<&Arc<BusScope>> {
        self.subordinate.as_ref()
    }

    #[inline]
    pub fn is_bridge(&self) -> bool {
        self.subordinate.is_some()
    }
}
