//! Firmware-side view of a device: its companion object, wake-event key,
//! power states and interrupt-routing table.
//!
//! These types describe what the platform firmware reports. Parsing the
//! firmware tables that produce them happens elsewhere; this crate only
//! reads them and flips the companion's `run_wake` flag.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// Opaque handle of the event controller instance owning an event number.
///
/// Event numbers are only unique within a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventDomain(pub usize);

impl EventDomain {
    /// The fixed event block described by the platform's main firmware table.
    pub const FIXED_BLOCK: Self = Self(0);
}

/// Identifies a wake event: `(domain, number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// The owning event controller.
    pub domain: EventDomain,
    /// Index within `domain`.
    pub number: u32,
}

impl EventKey {
    /// Creates a new event key.
    pub const fn new(domain: EventDomain, number: u32) -> Self {
        Self { domain, number }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpe {:#x}@{}", self.number, self.domain.0)
    }
}

/// How the event controller latches a wake event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Asserted while the condition holds; wake sources are level-triggered.
    Level,
    /// Latched on a transition.
    Edge,
}

/// Device power states as reported by firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PowerState {
    D0,
    D1,
    D2,
    D3Hot,
    D3Cold,
    /// Firmware does not describe the state.
    Unknown,
}

/// One interrupt-routing entry: a slot's interrupt pin wired to a platform line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Device (slot) number on the bus segment.
    pub slot: u8,
    /// Interrupt pin, 0 = INTA .. 3 = INTD.
    pub pin: u8,
    /// Global system interrupt the pin is wired to.
    pub gsi: u32,
}

/// Parsed interrupt-routing table for one bus segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    /// Creates a routing table from parsed entries.
    pub fn new(entries: Vec<RoutingEntry>) -> Self {
        Self { entries }
    }

    /// Returns the routing entries.
    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    /// Looks up the line a slot's pin is wired to.
    pub fn lookup(&self, slot: u8, pin: u8) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.slot == slot && e.pin == pin)
            .map(|e| e.gsi)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Firmware companion object paired with an enumerated device.
#[derive(Debug)]
pub struct Companion {
    /// Absolute firmware namespace path, e.g. `\_SB_.PCI0.RP01`.
    path: String,
    /// Wake event, present only if firmware declares the device wake-capable.
    wakeup: Option<EventKey>,
    /// Device is currently armed for runtime wakeup.
    run_wake: AtomicBool,
}

impl Companion {
    /// Creates a companion without wake capability.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            wakeup: None,
            run_wake: AtomicBool::new(false),
        }
    }

    /// Declares the companion wake-capable through `key`.
    pub fn with_wakeup(mut self, key: EventKey) -> Self {
        self.wakeup = Some(key);
        self
    }

    /// Marks the companion as already armed for runtime wake.
    pub fn with_run_wake(self, run_wake: bool) -> Self {
        self.run_wake.store(run_wake, Ordering::Relaxed);
        self
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the wake event key if the companion is wake-capable.
    #[inline]
    pub fn wakeup(&self) -> Option<EventKey> {
        self.wakeup
    }

    #[inline]
    pub fn is_wake_capable(&self) -> bool {
        self.wakeup.is_some()
    }

    #[inline]
    pub fn run_wake(&self) -> bool {
        self.run_wake.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_run_wake(&self, run_wake: bool) {
        self.run_wake.store(run_wake, Ordering::Release);
    }
}
