//! Static and runtime hardware feature enumeration.
//!
//! The probe trait boundary is in scope; platform-specific runtime
//! backends (reading actual cache sizes, VRAM, clock speed from the
//! host) are collaborator-shaped and out of scope. [`CompileTimeProbe`]
//! is the concrete, fully-built reference implementation: it reports
//! only what is knowable from build configuration and leaves every
//! runtime-only field at zero/`false`, matching "probe failures leave
//! unknown fields as zero/false".

/// CPU feature enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuFeatures {
    /// Number of logical cores, `0` if unknown.
    pub logical_cores: u32,
    /// Hardware floating point unit present.
    pub has_fpu: bool,
    /// SIMD instruction support present.
    pub has_simd: bool,
    /// L1 data cache size in bytes, `0` if unknown.
    pub l1_cache_bytes: u32,
    /// L2 cache size in bytes, `0` if unknown.
    pub l2_cache_bytes: u32,
    /// Estimated clock speed in MHz, `0` if unknown.
    pub clock_mhz: u32,
}

/// GPU/graphics feature enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuFeatures {
    /// Fixed-function or minimal shader support.
    pub has_basic_shaders: bool,
    /// Programmable vertex/fragment shader support.
    pub has_programmable_shaders: bool,
    /// Compute-shader class support.
    pub has_compute_shaders: bool,
    /// Video RAM available to the GPU in bytes, `0` if unknown.
    pub vram_bytes: u64,
}

/// Memory subsystem feature enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryFeatures {
    /// Total addressable system memory in bytes.
    pub total_bytes: u64,
    /// Virtual memory / paged address translation available.
    pub has_virtual_memory: bool,
    /// Direct memory access transfers available.
    pub has_dma: bool,
}

/// I/O subsystem feature enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoFeatures {
    /// Network sockets available.
    pub has_network_sockets: bool,
    /// Persistent block storage available.
    pub has_block_storage: bool,
    /// Pointer/mouse-class input available.
    pub has_pointer_input: bool,
    /// Digital gamepad input available.
    pub has_gamepad_input: bool,
}

/// Aggregate result of one probe pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeResult {
    /// CPU features.
    pub cpu: CpuFeatures,
    /// GPU features.
    pub gpu: GpuFeatures,
    /// Memory features.
    pub memory: MemoryFeatures,
    /// I/O features.
    pub io: IoFeatures,
}

/// Idempotent, side-effect-free hardware feature enumerator.
///
/// Implementations must not perform blocking I/O and must be safe to
/// call repeatedly; [`crate::detector::CapabilityDetector`] relies on
/// both properties.
pub trait HardwareProbe: Send + Sync {
    /// Returns the current feature snapshot.
    fn probe(&self) -> ProbeResult;
}

/// Reference probe reporting only compile-time-knowable baseline
/// features (architecture word width, `cfg!(target_feature = ...)`
/// SIMD availability). Every runtime-only field is left at its zero
/// value, which this crate's capability pipeline treats identically to
/// "probe could not determine this".
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileTimeProbe {
    /// Total system memory to report, since this is not derivable at
    /// compile time; `0` if the caller has no better estimate.
    pub known_total_memory_bytes: u64,
    /// Logical core count to report, likewise not derivable at compile
    /// time.
    pub known_logical_cores: u32,
}

impl CompileTimeProbe {
    /// Creates a probe that additionally reports `total_memory_bytes`
    /// and `logical_cores`, values a host environment typically knows
    /// even when finer-grained runtime probing is unavailable.
    #[must_use]
    pub const fn with_known_totals(total_memory_bytes: u64, logical_cores: u32) -> Self {
        Self {
            known_total_memory_bytes: total_memory_bytes,
            known_logical_cores: logical_cores,
        }
    }
}

impl HardwareProbe for CompileTimeProbe {
    fn probe(&self) -> ProbeResult {
        ProbeResult {
            cpu: CpuFeatures {
                logical_cores: self.known_logical_cores,
                has_fpu: cfg!(target_feature = "sse2") || cfg!(target_arch = "x86_64"),
                has_simd: cfg!(any(
                    target_feature = "sse2",
                    target_feature = "neon",
                    target_feature = "simd128"
                )),
                l1_cache_bytes: 0,
                l2_cache_bytes: 0,
                clock_mhz: 0,
            },
            gpu: GpuFeatures::default(),
            memory: MemoryFeatures {
                total_bytes: self.known_total_memory_bytes,
                has_virtual_memory: cfg!(not(target_os = "none")),
                has_dma: false,
            },
            io: IoFeatures {
                has_network_sockets: cfg!(not(target_os = "none")),
                has_block_storage: false,
                has_pointer_input: false,
                has_gamepad_input: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompileTimeProbe, HardwareProbe};

    #[test]
    fn compile_time_probe_reports_known_totals_and_zero_unknowns() {
        let probe = CompileTimeProbe::with_known_totals(16 * 1024 * 1024, 1);
        let result = probe.probe();
        assert_eq!(result.memory.total_bytes, 16 * 1024 * 1024);
        assert_eq!(result.cpu.logical_cores, 1);
        assert_eq!(result.cpu.l1_cache_bytes, 0);
        assert_eq!(result.gpu.vram_bytes, 0);
    }

    #[test]
    fn probe_is_idempotent() {
        let probe = CompileTimeProbe::with_known_totals(32 * 1024 * 1024, 2);
        assert_eq!(probe.probe(), probe.probe());
    }
}
