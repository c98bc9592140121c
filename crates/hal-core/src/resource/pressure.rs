//! Pressure computation with hysteresis.

use super::budget::ResourceBudget;

/// Qualitative measure of how close a resource class is to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ResourcePressure {
    /// Usage well below the warning threshold.
    #[default]
    None,
    /// Between the warning threshold and its midpoint with critical.
    Low,
    /// Between the warning/critical midpoint and the critical threshold.
    Medium,
    /// At or above the critical threshold but below full capacity.
    High,
    /// At or above full capacity after reclamation failed to bring usage
    /// back under budget.
    Critical,
}

/// Percentage points of hysteresis applied on pressure downgrade, per the
/// component design ("symmetric hysteresis of 3 percentage points").
pub const HYSTERESIS_POINTS: f64 = 3.0;

/// Computes the pressure level for `current` bytes against `budget`,
/// applying downgrade hysteresis relative to `previous`: a downgrade is
/// only honored once usage has dropped at least [`HYSTERESIS_POINTS`]
/// below the threshold that produced `previous`.
#[must_use]
pub fn compute_pressure(
    current: u64,
    budget: &ResourceBudget,
    previous: ResourcePressure,
) -> ResourcePressure {
    let utilization_pct = if budget.max_bytes == 0 {
        100.0
    } else {
        (current as f64 / budget.max_bytes as f64) * 100.0
    };
    let warning = f64::from(budget.warning_pct);
    let critical = f64::from(budget.critical_pct);
    let midpoint = (warning + critical) / 2.0;

    let raw = if utilization_pct >= 100.0 {
        ResourcePressure::Critical
    } else if utilization_pct >= critical {
        ResourcePressure::High
    } else if utilization_pct >= midpoint {
        ResourcePressure::Medium
    } else if utilization_pct >= warning {
        ResourcePressure::Low
    } else {
        ResourcePressure::None
    };

    if raw >= previous {
        // Upgrades (including reaching Critical in one step from any
        // level) always apply immediately.
        return raw;
    }

    // Downgrade: only honor it once utilization has dropped at least
    // HYSTERESIS_POINTS below the threshold that produced `previous`.
    let previous_floor = match previous {
        ResourcePressure::None => return ResourcePressure::None,
        ResourcePressure::Low => warning,
        ResourcePressure::Medium => midpoint,
        ResourcePressure::High => critical,
        ResourcePressure::Critical => 100.0,
    };
    if utilization_pct <= previous_floor - HYSTERESIS_POINTS {
        raw
    } else {
        previous
    }
}
