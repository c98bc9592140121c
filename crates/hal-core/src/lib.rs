//! Hardware abstraction layer runtime: driver registry, resource
//! manager, event bus, capability detection, configuration, and a
//! `Platform` coordinator tying them into one lifecycle.

/// Micro-benchmark subsystems and the deterministic tier classifier.
pub mod benchmark;
/// Capability bitmask, performance tiers, and platform descriptors.
pub mod capability;
/// TTL-bounded capability cache with optional persistence.
pub mod cache;
/// Layered runtime configuration with validation and rollback.
pub mod config;
/// Ties hardware probing and benchmarking into capability snapshots.
pub mod detector;
/// Zero-allocation tagged error/result model shared by every module.
pub mod error;
/// Categorized events, filtered subscriptions, and bounded dispatch.
pub mod event;
/// Top-level lifecycle coordinator.
pub mod platform;
/// Compile-time and runtime hardware feature detection.
pub mod probe;
/// Multi-driver registry with capability-based resolution.
pub mod registry;
/// Typed resource handles, budgets, pressure, and reclamation.
pub mod resource;
/// Lock shim selecting real primitives or single-threaded stand-ins.
pub mod sync;

pub use benchmark::{BenchmarkConfig, BenchmarkResults, BenchmarkRunner, Subsystem, SubsystemScore};
pub use cache::{CacheConfig, CacheValue, CapabilityCache, InvalidationReason, PersistentCache};
pub use capability::{CapabilityMask, CapabilityProvider, PerformanceTier, PlatformDescriptor};
pub use config::{ConfigLayer, ConfigManager, ConfigSource, ConfigValue, ConfigWatcher};
pub use detector::{CapabilityDetector, DetectionResults};
pub use error::{codes, Error, ErrorCategory, HalResult, HalUnit, ResultExt};
pub use event::{Event, EventBus, EventCategory, EventDraft, EventPayload, EventSeverity, EventSubscriber, Filter};
pub use event::wire::{decode_event, encode_event};
pub use platform::{CoordinatorState, InterfaceSpec, Platform};
pub use probe::{CompileTimeProbe, HardwareProbe, ProbeResult};
pub use registry::{CapabilityRequirements, Driver, DriverFactory, DriverInfo, DriverRegistry, DriverVersion, PlatformMask, ANY_PLATFORM};
pub use resource::{AcquisitionMode, ResourceBudget, ResourceHandle, ResourceManager, ResourcePressure, ResourceStats, ResourceType, ScopedResource};
