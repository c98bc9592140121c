//! Resource classes, budgets, acquisition modes, and usage counters.

use std::time::Duration;

/// Enum of resource classes the manager tracks budgets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// General-purpose host memory.
    Memory,
    /// An off-screen or on-screen graphics surface.
    GraphicsSurface,
    /// A mixed audio voice/channel.
    AudioVoice,
    /// A generic I/O port or device handle.
    IoPort,
    /// Persistent block or key-value storage.
    Storage,
    /// A network socket or connection slot.
    Network,
    /// Application-defined resource class, distinguished by an opaque id.
    Custom(u32),
}

/// How [`super::ResourceManager::acquire`] should behave when a type's
/// budget has no headroom for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Wait indefinitely (bounded by the budget's configured `timeout`)
    /// for space to free up.
    Blocking,
    /// Fail immediately with `Resource/resource_exhausted`.
    NonBlocking,
    /// Wait up to the given duration, like `Blocking` with a caller-chosen
    /// bound.
    Timeout(Duration),
    /// Invoke registered reclamation callbacks before failing.
    Emergency,
}

/// Per-resource-type budget and reclamation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBudget {
    /// Hard ceiling for this resource type, in bytes.
    pub max_bytes: u64,
    /// Bytes permanently reserved (never available to `acquire`).
    pub reserved_bytes: u64,
    /// Utilization percentage (0-100) at which pressure first rises above
    /// `None`.
    pub warning_pct: u8,
    /// Utilization percentage (0-100) at which pressure reaches `High`.
    pub critical_pct: u8,
    /// Whether `Emergency` acquisition may invoke reclamation callbacks.
    pub allow_reclamation: bool,
    /// Default wait bound for `Blocking` acquisition.
    pub timeout: Duration,
}

impl ResourceBudget {
    /// Validates the budget's internal invariants:
    /// `reserved <= max`, `warning_pct <= critical_pct <= 100`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.reserved_bytes <= self.max_bytes
            && self.warning_pct <= self.critical_pct
            && self.critical_pct <= 100
    }

    /// Bytes actually available for `acquire` to hand out.
    #[must_use]
    pub const fn available_bytes(&self) -> u64 {
        self.max_bytes.saturating_sub(self.reserved_bytes)
    }
}

/// Monotonic counters plus the current usage snapshot for one resource
/// type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStats {
    /// Lifetime total bytes successfully acquired.
    pub total_acquired_bytes: u64,
    /// Lifetime total bytes released.
    pub total_released_bytes: u64,
    /// Bytes currently outstanding (`acquired - released`).
    pub current_usage_bytes: u64,
    /// Number of `acquire` calls that failed outright (exhausted/timeout/
    /// out-of-memory).
    pub failed_acquisitions: u64,
}

#[cfg(test)]
mod tests {
    use super::ResourceBudget;
    use std::time::Duration;

    #[test]
    fn valid_budget_satisfies_invariants() {
        let budget = ResourceBudget {
            max_bytes: 100,
            reserved_bytes: 10,
            warning_pct: 70,
            critical_pct: 95,
            allow_reclamation: true,
            timeout: Duration::from_secs(1),
        };
        assert!(budget.is_valid());
        assert_eq!(budget.available_bytes(), 90);
    }

    #[test]
    fn invalid_budget_detected() {
        let budget = ResourceBudget {
            max_bytes: 100,
            reserved_bytes: 200,
            warning_pct: 95,
            critical_pct: 70,
            allow_reclamation: false,
            timeout: Duration::from_secs(1),
        };
        assert!(!budget.is_valid());
    }
}
