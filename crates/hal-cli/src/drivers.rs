//! In-memory reference drivers exercised by `hal-cli demo`.
//!
//! These are not real device backends: `NullMemoryDriver` and
//! `NullAudioDriver` just track an active flag and report a fixed
//! capability set, enough to drive the registry, resource manager, and
//! event bus through a realistic lifecycle without any hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hal_core::{
    CapabilityMask, CapabilityProvider, Driver, DriverVersion, HalUnit, PerformanceTier,
    PlatformDescriptor,
};

/// Reference `memory` interface driver: always available, no real
/// backing store.
pub struct NullMemoryDriver {
    active: AtomicBool,
}

impl NullMemoryDriver {
    /// Builds an inactive instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }
}

impl Default for NullMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProvider for NullMemoryDriver {
    fn mask(&self) -> CapabilityMask {
        CapabilityMask::VIRTUAL_MEMORY | CapabilityMask::DMA
    }

    fn tier(&self) -> PerformanceTier {
        PerformanceTier::Standard
    }

    fn platform(&self) -> PlatformDescriptor {
        PlatformDescriptor::unknown()
    }
}

impl Driver for NullMemoryDriver {
    fn interface_name(&self) -> &'static str {
        "memory"
    }

    fn driver_name(&self) -> &'static str {
        "null-memory"
    }

    fn version(&self) -> DriverVersion {
        DriverVersion::new(1, 0, 0)
    }

    fn priority(&self) -> i32 {
        10
    }

    fn initialize(&self) -> HalUnit {
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn shutdown(&self) -> HalUnit {
        self.active.store(false, Ordering::Release);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Reference `audio` interface driver. Depends on `memory` being
/// initialized first, matching a typical audio-needs-a-memory-allocator
/// dependency.
pub struct NullAudioDriver {
    active: AtomicBool,
}

impl NullAudioDriver {
    /// Builds an inactive instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }
}

impl Default for NullAudioDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProvider for NullAudioDriver {
    fn mask(&self) -> CapabilityMask {
        CapabilityMask::AUDIO_HARDWARE_MIX
    }

    fn tier(&self) -> PerformanceTier {
        PerformanceTier::Limited
    }

    fn platform(&self) -> PlatformDescriptor {
        PlatformDescriptor::unknown()
    }
}

impl Driver for NullAudioDriver {
    fn interface_name(&self) -> &'static str {
        "audio"
    }

    fn driver_name(&self) -> &'static str {
        "null-audio"
    }

    fn version(&self) -> DriverVersion {
        DriverVersion::new(1, 0, 0)
    }

    fn priority(&self) -> i32 {
        10
    }

    fn initialize(&self) -> HalUnit {
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn shutdown(&self) -> HalUnit {
        self.active.store(false, Ordering::Release);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Convenience alias so `main.rs` doesn't need to spell out `Arc<dyn
/// Driver>` at each call site.
pub fn as_driver<D: Driver + 'static>(driver: D) -> Arc<dyn Driver> {
    Arc::new(driver)
}
