use crate::firmware::TriggerMode;

/// Tunables for the bind controller and its wake path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeConfig {
    /// Trigger mode used when installing a shared wake-event handler.
    pub trigger_mode: TriggerMode,
    /// Whether a wake on a bridge is propagated to devices behind it.
    pub propagate_wake: bool,
    /// Whether firmware interrupt-routing tables are applied on bind.
    pub apply_routing: bool,
}

/// The implemention for WakeConfig
impl WakeConfig {
    /// Level-triggered handlers, bridge propagation and routing enabled.
    pub const fn new() -> Self {
        Self {
            trigger_mode: TriggerMode::Level,
            propagate_wake: true,
            apply_routing: true,
        }
    }

    /// Sets the trigger mode for installed handlers.
    pub const fn with_trigger_mode(mut self, trigger_mode: TriggerMode) -> Self {
        self.trigger_mode = trigger_mode;
        self
    }

    /// Enables or disables wake propagation to subordinate scopes.
    pub const fn with_propagation(mut self, propagate_wake: bool) -> Self {
        self.propagate_wake = propagate_wake;
        self
    }

    /// Enables or disables routing-table application.
    pub const fn with_routing(mut self, apply_routing: bool) -> Self {
        self.apply_routing = apply_routing;
        self
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self::new()
    }
}
