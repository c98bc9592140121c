//! Capability bits, performance tiers, and the platform descriptor.
//!
//! This module is purely descriptive: nothing here performs I/O.

use bitflags::bitflags;

bitflags! {
    /// A 32-bit mask of hardware/software capabilities a driver, platform,
    /// or requirement set may advertise or demand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct CapabilityMask: u32 {
        /// Multi-threaded execution is available.
        const THREADING = 1 << 0;
        /// Direct memory access transfers are available.
        const DMA = 1 << 1;
        /// Virtual memory / paged address translation is available.
        const VIRTUAL_MEMORY = 1 << 2;
        /// Fixed-function or minimal shader support.
        const SHADER_BASIC = 1 << 3;
        /// Programmable vertex/fragment shader support.
        const SHADER_PROGRAMMABLE = 1 << 4;
        /// Compute-shader class support.
        const SHADER_COMPUTE = 1 << 5;
        /// Hardware audio mixing.
        const AUDIO_HARDWARE_MIX = 1 << 6;
        /// Multichannel audio output.
        const AUDIO_MULTICHANNEL = 1 << 7;
        /// Pointer/mouse-class input.
        const INPUT_POINTER = 1 << 8;
        /// Digital gamepad input.
        const INPUT_GAMEPAD = 1 << 9;
        /// Touch input.
        const INPUT_TOUCH = 1 << 10;
        /// Network sockets are available.
        const NETWORK_SOCKETS = 1 << 11;
        /// Low-latency networking (e.g. for real-time protocols).
        const NETWORK_LOW_LATENCY = 1 << 12;
        /// High-resolution monotonic timing.
        const TIMING_HIGH_RESOLUTION = 1 << 13;
        /// Persistent block storage.
        const STORAGE_BLOCK = 1 << 14;
        /// Persistent key-value storage.
        const STORAGE_KV = 1 << 15;
        /// Dynamic power management (suspend/resume, scaling).
        const POWER_MANAGEMENT = 1 << 16;
        /// Runtime is sandboxed and restricts filesystem/network access.
        const SANDBOX_RESTRICTED = 1 << 17;
    }
}

impl CapabilityMask {
    /// Returns `true` if every bit of `required` is present in `self`.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.contains(required)
    }

    /// Number of bits shared between `self` and `preferred`.
    #[must_use]
    pub const fn preferred_overlap(self, preferred: Self) -> u32 {
        self.intersection(preferred).bits().count_ones()
    }
}

/// Coarse quality-of-service class used to select among drivers.
///
/// Ordered `Minimal < Limited < Standard < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PerformanceTier {
    /// Severely constrained platforms (e.g. Dreamcast, PSP).
    Minimal,
    /// Constrained but usable desktop-class floor.
    Limited,
    /// Typical modern desktop/console.
    Standard,
    /// High-end desktop or cloud VM class.
    High,
}

/// Static description of the platform a process is running on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PlatformDescriptor {
    /// Human-readable platform name, e.g. `"dreamcast"`, `"desktop-linux"`.
    pub name: String,
    /// Instruction set / architecture identifier, e.g. `"sh4"`, `"x86_64"`.
    pub architecture: String,
    /// Classified aggregate performance tier.
    pub tier: PerformanceTier,
    /// Total addressable system memory, in bytes.
    pub total_memory_bytes: u64,
    /// Number of logical CPU cores.
    pub cpu_cores: u32,
    /// Whether a hardware floating point unit is present.
    pub has_fpu: bool,
    /// Whether SIMD instructions are available.
    pub has_simd: bool,
}

impl PlatformDescriptor {
    /// A minimal, single-core, no-FPU placeholder descriptor, useful as a
    /// safe fallback when probing fails entirely.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_owned(),
            architecture: "unknown".to_owned(),
            tier: PerformanceTier::Minimal,
            total_memory_bytes: 0,
            cpu_cores: 1,
            has_fpu: false,
            has_simd: false,
        }
    }
}

/// Capability set exposed by anything that can describe its supported
/// capabilities, tier, and platform: drivers, the capability detector, and
/// test doubles all implement this.
pub trait CapabilityProvider {
    /// Returns `true` if `cap` is present in [`CapabilityProvider::mask`].
    fn supports(&self, cap: CapabilityMask) -> bool {
        self.mask().contains(cap)
    }

    /// The full capability mask.
    fn mask(&self) -> CapabilityMask;

    /// The set bits of [`CapabilityProvider::mask`] as individual flags.
    fn list(&self) -> Vec<CapabilityMask> {
        self.mask().iter().collect()
    }

    /// The classified performance tier.
    fn tier(&self) -> PerformanceTier;

    /// The platform this provider describes.
    fn platform(&self) -> PlatformDescriptor;

    /// Whether a fallback exists if `cap` is unavailable. The default
    /// implementation has no knowledge of fallback chains and always
    /// returns `false`; the driver registry overrides this using
    /// `fallback_drivers`.
    fn has_fallback(&self, cap: CapabilityMask) -> bool {
        let _ = cap;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityMask, PerformanceTier};

    #[test]
    fn satisfies_requires_all_bits() {
        let mask = CapabilityMask::THREADING | CapabilityMask::DMA;
        assert!(mask.satisfies(CapabilityMask::THREADING));
        assert!(!mask.satisfies(CapabilityMask::VIRTUAL_MEMORY));
    }

    #[test]
    fn preferred_overlap_counts_shared_bits() {
        let mask = CapabilityMask::THREADING | CapabilityMask::DMA | CapabilityMask::AUDIO_HARDWARE_MIX;
        let preferred = CapabilityMask::DMA | CapabilityMask::AUDIO_HARDWARE_MIX | CapabilityMask::SHADER_COMPUTE;
        assert_eq!(mask.preferred_overlap(preferred), 2);
    }

    #[test]
    fn performance_tier_is_totally_ordered() {
        assert!(PerformanceTier::Minimal < PerformanceTier::Limited);
        assert!(PerformanceTier::Limited < PerformanceTier::Standard);
        assert!(PerformanceTier::Standard < PerformanceTier::High);
    }
}
