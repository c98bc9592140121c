//! The driver-facing contract and the registration metadata the registry
//! stores for each entry.

use std::sync::Arc;

use crate::capability::{CapabilityMask, CapabilityProvider, PerformanceTier, PlatformDescriptor};
use crate::error::HalUnit;

/// Semantic version triple carried by [`DriverInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverVersion {
    /// Major version; incremented on breaking changes.
    pub major: u16,
    /// Minor version; incremented on backward-compatible additions.
    pub minor: u16,
    /// Patch version; incremented on fixes.
    pub patch: u16,
}

impl DriverVersion {
    /// Builds a version triple.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// A bitmask of platform identifiers a driver declares support for.
/// Each set bit names one platform the owning [`crate::platform::Platform`]
/// may be running on; interpretation of individual bits is left to the
/// embedding application (e.g. bit 0 = desktop, bit 1 = dreamcast, ...).
pub type PlatformMask = u32;

/// Bit set to `1` in [`DriverInfo::supported_platforms_mask`] means "any
/// platform"; used by reference/test drivers that don't care which
/// platform they run on.
pub const ANY_PLATFORM: PlatformMask = u32::MAX;

/// Capability-set and lifecycle contract every driver implements.
///
/// Combines [`CapabilityProvider`] (descriptive capability surface) with
/// the lifecycle hooks the registry calls during `initialize`/`shutdown`.
pub trait Driver: CapabilityProvider + Send + Sync {
    /// The interface this driver implements, e.g. `"audio"`, `"memory"`.
    fn interface_name(&self) -> &'static str;

    /// This driver's own name, unique within its interface bucket.
    fn driver_name(&self) -> &'static str;

    /// Semantic version of this driver implementation.
    fn version(&self) -> DriverVersion;

    /// Selection priority; higher wins ties before any other tiebreak.
    fn priority(&self) -> i32;

    /// Brings the driver into an active state. Idempotent: calling it
    /// again while already active is a no-op that returns `Ok`.
    fn initialize(&self) -> HalUnit;

    /// Tears the driver down. Idempotent in the same sense as
    /// [`Driver::initialize`].
    fn shutdown(&self) -> HalUnit;

    /// Whether [`Driver::initialize`] has been called without a matching
    /// [`Driver::shutdown`].
    fn is_active(&self) -> bool;

    /// Whether the driver can currently be selected. A driver that is
    /// registered but transiently unavailable (e.g. device unplugged)
    /// returns `false` here without being unregistered.
    fn is_available(&self) -> bool;
}

/// A factory producing fresh driver instances of a single concrete type.
pub type DriverFactory = Arc<dyn Fn() -> Arc<dyn Driver> + Send + Sync>;

/// Registration metadata for one driver, supplied to
/// [`crate::registry::DriverRegistry::register`].
#[derive(Clone)]
pub struct DriverInfo {
    /// Unique name within the owning interface bucket.
    pub name: &'static str,
    /// Semantic version.
    pub version: DriverVersion,
    /// Platforms this driver declares support for.
    pub supported_platforms_mask: PlatformMask,
    /// Capabilities this driver advertises.
    pub capability_mask: CapabilityMask,
    /// Selection priority; higher is preferred.
    pub priority: i32,
    /// Performance tier this driver targets.
    pub tier: PerformanceTier,
    /// Factory producing a fresh instance, or `None` if an
    /// already-constructed instance was supplied via
    /// [`crate::registry::DriverRegistry::register_instance`].
    pub factory: Option<DriverFactory>,
    /// Names of other interfaces this driver depends on being initialized
    /// first.
    pub dependencies: Vec<&'static str>,
    /// Advisory fallback driver names, consulted only after ranked
    /// candidates are exhausted.
    pub fallback_drivers: Vec<&'static str>,
    /// Estimated steady-state memory footprint, in bytes.
    pub memory_overhead_bytes: u64,
    /// Whether the driver can be swapped for another live instance
    /// without a full interface restart.
    pub supports_hot_swap: bool,
    /// Human-readable description.
    pub description: &'static str,
}

impl DriverInfo {
    /// Returns `true` if this info has neither a factory nor relies on a
    /// pre-built instance — i.e. it cannot ever be materialized.
    #[must_use]
    pub const fn is_factory_missing(&self) -> bool {
        self.factory.is_none()
    }
}

/// Filter describing what a caller needs from a resolved driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilityRequirements {
    /// Capabilities the driver must have.
    pub required_mask: CapabilityMask,
    /// Capabilities that improve ranking but aren't mandatory.
    pub preferred_mask: CapabilityMask,
    /// Minimum acceptable performance tier.
    pub min_tier: Option<PerformanceTier>,
    /// Maximum acceptable `memory_overhead_bytes`.
    pub max_memory_overhead: Option<u64>,
    /// Whether the driver must support hot-swap.
    pub require_hot_swap: bool,
}

impl CapabilityRequirements {
    /// No constraints: matches any driver available on the platform.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn matches(&self, info: &DriverInfo, platform: PlatformMask) -> bool {
        if info.supported_platforms_mask & platform == 0 {
            return false;
        }
        if !info.capability_mask.satisfies(self.required_mask) {
            return false;
        }
        if let Some(min_tier) = self.min_tier {
            if info.tier < min_tier {
                return false;
            }
        }
        if let Some(max_overhead) = self.max_memory_overhead {
            if info.memory_overhead_bytes > max_overhead {
                return false;
            }
        }
        if self.require_hot_swap && !info.supports_hot_swap {
            return false;
        }
        true
    }
}

/// Registry-internal bookkeeping for one registered driver.
pub(crate) struct DriverEntry {
    pub info: DriverInfo,
    pub instance: Option<Arc<dyn Driver>>,
    pub initialized: bool,
    /// Monotonic insertion order, used as the final ranking tiebreak.
    pub insertion_seq: u64,
}

impl DriverEntry {
    pub(crate) fn new(info: DriverInfo, insertion_seq: u64) -> Self {
        Self {
            info,
            instance: None,
            initialized: false,
            insertion_seq,
        }
    }

    /// Materializes the instance (calling the factory if needed) and
    /// returns a clone of the strong reference.
    pub(crate) fn materialize(&mut self) -> Option<Arc<dyn Driver>> {
        if let Some(instance) = &self.instance {
            return Some(Arc::clone(instance));
        }
        let factory = self.info.factory.as_ref()?;
        let instance = factory();
        self.instance = Some(Arc::clone(&instance));
        Some(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityRequirements, DriverInfo, DriverVersion, ANY_PLATFORM};
    use crate::capability::{CapabilityMask, PerformanceTier};

    fn sample_info(caps: CapabilityMask, tier: PerformanceTier) -> DriverInfo {
        DriverInfo {
            name: "sample",
            version: DriverVersion::new(1, 0, 0),
            supported_platforms_mask: ANY_PLATFORM,
            capability_mask: caps,
            priority: 0,
            tier,
            factory: None,
            dependencies: Vec::new(),
            fallback_drivers: Vec::new(),
            memory_overhead_bytes: 1024,
            supports_hot_swap: true,
            description: "test driver",
        }
    }

    #[test]
    fn requirements_reject_missing_required_bits() {
        let info = sample_info(CapabilityMask::THREADING, PerformanceTier::Standard);
        let reqs = CapabilityRequirements {
            required_mask: CapabilityMask::DMA,
            ..CapabilityRequirements::none()
        };
        assert!(!reqs.matches(&info, ANY_PLATFORM));
    }

    #[test]
    fn requirements_reject_platform_mismatch() {
        let mut info = sample_info(CapabilityMask::empty(), PerformanceTier::Standard);
        info.supported_platforms_mask = 0b0001;
        assert!(!CapabilityRequirements::none().matches(&info, 0b0010));
        assert!(CapabilityRequirements::none().matches(&info, 0b0001));
    }

    #[test]
    fn requirements_reject_below_min_tier() {
        let info = sample_info(CapabilityMask::empty(), PerformanceTier::Limited);
        let reqs = CapabilityRequirements {
            min_tier: Some(PerformanceTier::Standard),
            ..CapabilityRequirements::none()
        };
        assert!(!reqs.matches(&info, ANY_PLATFORM));
    }
}
