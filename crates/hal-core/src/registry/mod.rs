//! Multi-driver-per-interface store: registration, capability-based
//! selection, fallback chains, lazy factories, and a resolution cache.

pub mod driver;
mod rank;

pub use driver::{
    CapabilityRequirements, Driver, DriverFactory, DriverInfo, DriverVersion, PlatformMask,
    ANY_PLATFORM,
};

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use driver::DriverEntry;

use crate::error::{codes, Error, ErrorCategory, HalResult, HalUnit};
use crate::event::{DriverEventPayload, EventBus, EventCategory, EventDraft, EventPayload, EventSeverity};
use crate::sync::{self, RwLock};

type InterfaceName = &'static str;

struct Bucket {
    entries: Vec<DriverEntry>,
}

/// A cached resolution: weak so a driver that nobody else holds can still
/// be dropped, and invalidated whenever its bucket changes.
struct CacheEntry {
    requirements_hash: u64,
    driver: Weak<dyn Driver>,
}

/// Owns all driver registrations across every interface and resolves
/// queries to the best matching driver.
pub struct DriverRegistry {
    buckets: RwLock<HashMap<InterfaceName, Bucket>>,
    cache: RwLock<HashMap<InterfaceName, CacheEntry>>,
    insertion_counter: AtomicU64,
    current_platform: PlatformMask,
    events: Option<Arc<EventBus>>,
}

impl DriverRegistry {
    /// Creates an empty registry scoped to `current_platform`. Pass
    /// `events` to emit `Driver` category lifecycle events (e.g. on
    /// [`DriverRegistry::unregister`]); `None` disables event emission.
    #[must_use]
    pub fn new(current_platform: PlatformMask, events: Option<Arc<EventBus>>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            insertion_counter: AtomicU64::new(0),
            current_platform,
            events,
        }
    }

    /// Registers a factory-backed driver for `interface`. Fails with
    /// `Configuration/invalid_parameter` if `info` carries no factory.
    pub fn register(&self, interface: InterfaceName, info: DriverInfo) -> HalUnit {
        if info.is_factory_missing() {
            return Err(Error::new(
                ErrorCategory::Configuration,
                codes::configuration::INVALID_PARAMETER,
                "driver registration requires a factory or a pre-built instance",
            )
            .with_context("DriverRegistry::register"));
        }
        self.insert_entry(interface, info);
        Ok(())
    }

    /// Registers an already-constructed `instance` under `interface`,
    /// synthesizing [`DriverInfo`] metadata from it. If `make_fresh` is
    /// supplied it becomes the entry's factory for future re-materialization
    /// of the same concrete type; otherwise the entry is marked as having
    /// no factory (its single instance is the only one ever available).
    pub fn register_instance(
        &self,
        interface: InterfaceName,
        instance: Arc<dyn Driver>,
        priority: i32,
        make_fresh: Option<DriverFactory>,
    ) {
        let info = DriverInfo {
            name: instance.driver_name(),
            version: instance.version(),
            supported_platforms_mask: ANY_PLATFORM,
            capability_mask: instance.mask(),
            priority,
            tier: instance.tier(),
            factory: make_fresh,
            dependencies: Vec::new(),
            fallback_drivers: Vec::new(),
            memory_overhead_bytes: 0,
            supports_hot_swap: false,
            description: "",
        };
        let seq = self.insertion_counter.fetch_add(1, Ordering::AcqRel);
        let mut entry = DriverEntry::new(info, seq);
        entry.instance = Some(instance);
        self.insert_prebuilt(interface, entry);
    }

    fn insert_entry(&self, interface: InterfaceName, info: DriverInfo) {
        let seq = self.insertion_counter.fetch_add(1, Ordering::AcqRel);
        let entry = DriverEntry::new(info, seq);
        self.insert_prebuilt(interface, entry);
    }

    fn insert_prebuilt(&self, interface: InterfaceName, entry: DriverEntry) {
        let mut buckets = sync::write(&self.buckets);
        let bucket = buckets.entry(interface).or_insert_with(|| Bucket { entries: Vec::new() });
        bucket.entries.push(entry);
        bucket.entries.sort_by(|a, b| b.info.priority.cmp(&a.info.priority));
        drop(buckets);
        self.invalidate_cache(interface);
    }

    /// Removes the named driver from `interface`, shutting it down first
    /// if active. Emits a `Driver` category event on success.
    pub fn unregister(&self, interface: InterfaceName, name: &'static str) -> HalUnit {
        let removed = {
            let mut buckets = sync::write(&self.buckets);
            let Some(bucket) = buckets.get_mut(interface) else {
                return Ok(());
            };
            let position = bucket.entries.iter().position(|entry| entry.info.name == name);
            let Some(position) = position else {
                return Ok(());
            };
            let mut entry = bucket.entries.remove(position);
            if entry.initialized {
                if let Some(instance) = &entry.instance {
                    let _ = instance.shutdown();
                }
                entry.initialized = false;
            }
            true
        };
        if removed {
            self.invalidate_cache(interface);
            self.emit_driver_event(interface, name, "unregistered", EventSeverity::Info);
        }
        Ok(())
    }

    fn invalidate_cache(&self, interface: InterfaceName) {
        sync::write(&self.cache).remove(interface);
    }

    fn emit_driver_event(
        &self,
        interface: InterfaceName,
        name: &'static str,
        detail: &'static str,
        severity: EventSeverity,
    ) {
        let Some(bus) = &self.events else {
            return;
        };
        bus.publish(EventDraft {
            category: EventCategory::Driver,
            severity,
            source_id: "driver_registry",
            description: format!("driver '{name}' on interface '{interface}' {detail}"),
            attributes: HashMap::new(),
            payload: EventPayload::Driver(DriverEventPayload {
                interface,
                driver_name: name,
                detail,
            }),
        });
    }

    /// Resolves the best candidate on `interface` satisfying `requirements`
    /// (or [`CapabilityRequirements::none`] for no constraints).
    ///
    /// Fast path: a live cached driver for an identical requirements
    /// fingerprint is returned directly if still available. Otherwise
    /// ranks the bucket, materializes candidates in rank order, and
    /// returns the first one whose `is_available()` is true. Falls back to
    /// each ranked-out candidate's advisory `fallback_drivers` only after
    /// the ranked list is exhausted.
    pub fn resolve(
        &self,
        interface: InterfaceName,
        requirements: Option<&CapabilityRequirements>,
    ) -> HalResult<Arc<dyn Driver>> {
        let requirements = requirements.cloned().unwrap_or_default();
        let requirements_hash = hash_requirements(&requirements);

        if let Some(driver) = self.cached(interface, requirements_hash) {
            return Ok(driver);
        }

        let platform = self.current_platform;
        let mut buckets = sync::write(&self.buckets);
        let Some(bucket) = buckets.get_mut(interface) else {
            return Err(not_loaded());
        };

        let ranked = rank::rank_indices(&bucket.entries, &requirements);
        for index in ranked {
            let entry = &mut bucket.entries[index];
            if !requirements.matches(&entry.info, platform) {
                continue;
            }
            let Some(instance) = entry.materialize() else {
                continue;
            };
            if instance.is_available() {
                self.cache_driver(interface, requirements_hash, &instance);
                return Ok(instance);
            }
        }

        // Ranked candidates exhausted: consult advisory fallback chains in
        // the order each exhausted candidate declares them.
        let fallback_names: Vec<&'static str> = bucket
            .entries
            .iter()
            .flat_map(|entry| entry.info.fallback_drivers.iter().copied())
            .collect();
        for name in fallback_names {
            if let Some(position) = bucket.entries.iter().position(|entry| entry.info.name == name) {
                let entry = &mut bucket.entries[position];
                if let Some(instance) = entry.materialize() {
                    if instance.is_available() {
                        self.cache_driver(interface, requirements_hash, &instance);
                        return Ok(instance);
                    }
                }
            }
        }

        Err(not_loaded())
    }

    fn cached(&self, interface: InterfaceName, requirements_hash: u64) -> Option<Arc<dyn Driver>> {
        let cache = sync::read(&self.cache);
        let entry = cache.get(interface)?;
        if entry.requirements_hash != requirements_hash {
            return None;
        }
        let driver = entry.driver.upgrade()?;
        if driver.is_available() {
            Some(driver)
        } else {
            None
        }
    }

    fn cache_driver(&self, interface: InterfaceName, requirements_hash: u64, driver: &Arc<dyn Driver>) {
        sync::write(&self.cache).insert(
            interface,
            CacheEntry {
                requirements_hash,
                driver: Arc::downgrade(driver),
            },
        );
    }

    /// Resolves by exact driver name, bypassing ranking and the
    /// availability check, so callers can inspect a specific driver even
    /// if it currently reports unavailable.
    pub fn resolve_by_name(&self, interface: InterfaceName, name: &str) -> HalResult<Arc<dyn Driver>> {
        let mut buckets = sync::write(&self.buckets);
        let bucket = buckets.get_mut(interface).ok_or_else(not_loaded)?;
        let entry = bucket
            .entries
            .iter_mut()
            .find(|entry| entry.info.name == name)
            .ok_or_else(not_loaded)?;
        entry.materialize().ok_or_else(not_loaded)
    }

    /// Materializes and returns every entry on `interface`, in priority
    /// order.
    pub fn get_all(&self, interface: InterfaceName) -> Vec<Arc<dyn Driver>> {
        let mut buckets = sync::write(&self.buckets);
        let Some(bucket) = buckets.get_mut(interface) else {
            return Vec::new();
        };
        bucket.entries.iter_mut().filter_map(DriverEntry::materialize).collect()
    }

    /// Calls `initialize()` on every inactive entry's instance for
    /// `interface`. Failures are aggregated into a single `Internal` error
    /// naming the failed drivers; a partial success still returns `Err`.
    pub fn initialize(&self, interface: InterfaceName) -> HalUnit {
        let mut buckets = sync::write(&self.buckets);
        let Some(bucket) = buckets.get_mut(interface) else {
            return Ok(());
        };
        let mut failed = Vec::new();
        for entry in &mut bucket.entries {
            let Some(instance) = entry.materialize() else {
                continue;
            };
            if entry.initialized {
                continue;
            }
            match instance.initialize() {
                Ok(()) => entry.initialized = true,
                Err(_) => failed.push(entry.info.name),
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            log::warn!("interface '{interface}' had {} driver(s) fail to initialize", failed.len());
            Err(Error::new(
                ErrorCategory::Internal,
                codes::internal::AGGREGATED_FAILURE,
                "one or more drivers failed to initialize",
            )
            .with_context("see log for failed driver names"))
        }
    }

    /// Calls `shutdown()` on every active instance for `interface`, in
    /// reverse priority order, best-effort: individual errors are logged
    /// but do not abort the pass.
    pub fn shutdown(&self, interface: InterfaceName) {
        let mut buckets = sync::write(&self.buckets);
        let Some(bucket) = buckets.get_mut(interface) else {
            return;
        };
        for entry in bucket.entries.iter_mut().rev() {
            if !entry.initialized {
                continue;
            }
            if let Some(instance) = &entry.instance {
                if let Err(err) = instance.shutdown() {
                    log::warn!("driver '{}' failed to shut down cleanly: {err}", entry.info.name);
                }
            }
            entry.initialized = false;
        }
    }
}

fn not_loaded() -> Error {
    Error::new(
        ErrorCategory::Driver,
        codes::driver::DRIVER_NOT_LOADED,
        "no driver satisfies the given requirements",
    )
}

fn hash_requirements(requirements: &CapabilityRequirements) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    requirements.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityMask, CapabilityProvider, PerformanceTier, PlatformDescriptor};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestDriver {
        name: &'static str,
        available: AtomicBool,
    }

    impl CapabilityProvider for TestDriver {
        fn mask(&self) -> CapabilityMask {
            CapabilityMask::empty()
        }
        fn tier(&self) -> PerformanceTier {
            PerformanceTier::Standard
        }
        fn platform(&self) -> PlatformDescriptor {
            PlatformDescriptor::unknown()
        }
    }

    impl Driver for TestDriver {
        fn interface_name(&self) -> &'static str {
            "test"
        }
        fn driver_name(&self) -> &'static str {
            self.name
        }
        fn version(&self) -> DriverVersion {
            DriverVersion::new(1, 0, 0)
        }
        fn priority(&self) -> i32 {
            0
        }
        fn initialize(&self) -> HalUnit {
            Ok(())
        }
        fn shutdown(&self) -> HalUnit {
            Ok(())
        }
        fn is_active(&self) -> bool {
            true
        }
        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }
    }

    fn info_for(name: &'static str, priority: i32, available: bool) -> (DriverInfo, Arc<TestDriver>) {
        let driver = Arc::new(TestDriver {
            name,
            available: AtomicBool::new(available),
        });
        let for_factory = Arc::clone(&driver);
        let info = DriverInfo {
            name,
            version: DriverVersion::new(1, 0, 0),
            supported_platforms_mask: ANY_PLATFORM,
            capability_mask: CapabilityMask::empty(),
            priority,
            tier: PerformanceTier::Standard,
            factory: Some(Arc::new(move || Arc::clone(&for_factory) as Arc<dyn Driver>)),
            dependencies: Vec::new(),
            fallback_drivers: Vec::new(),
            memory_overhead_bytes: 0,
            supports_hot_swap: true,
            description: "",
        };
        (info, driver)
    }

    #[test]
    fn resolve_prefers_higher_priority_then_falls_back_after_unregister() {
        let registry = DriverRegistry::new(ANY_PLATFORM, None);
        let (low_info, _low) = info_for("low", 10, true);
        let (high_info, _high) = info_for("high", 50, true);
        registry.register("audio", low_info).unwrap();
        registry.register("audio", high_info).unwrap();

        let resolved = registry.resolve("audio", None).unwrap();
        assert_eq!(resolved.driver_name(), "high");

        registry.unregister("audio", "high").unwrap();
        let resolved = registry.resolve("audio", None).unwrap();
        assert_eq!(resolved.driver_name(), "low");
    }

    #[test]
    fn resolve_skips_unavailable_driver_without_unregistering() {
        let registry = DriverRegistry::new(ANY_PLATFORM, None);
        let (unavailable_info, _a) = info_for("unavailable", 50, false);
        let (available_info, _b) = info_for("available", 10, true);
        registry.register("audio", unavailable_info).unwrap();
        registry.register("audio", available_info).unwrap();

        let resolved = registry.resolve("audio", None).unwrap();
        assert_eq!(resolved.driver_name(), "available");
        assert_eq!(registry.get_all("audio").len(), 2);
    }

    #[test]
    fn resolve_returns_driver_not_loaded_when_nothing_matches() {
        let registry = DriverRegistry::new(ANY_PLATFORM, None);
        let requirements = CapabilityRequirements {
            required_mask: CapabilityMask::DMA,
            ..CapabilityRequirements::none()
        };
        let err = registry.resolve("audio", Some(&requirements)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Driver);
        assert_eq!(err.code(), codes::driver::DRIVER_NOT_LOADED);
    }

    #[test]
    fn register_without_factory_is_rejected() {
        let registry = DriverRegistry::new(ANY_PLATFORM, None);
        let info = DriverInfo {
            name: "broken",
            version: DriverVersion::new(1, 0, 0),
            supported_platforms_mask: ANY_PLATFORM,
            capability_mask: CapabilityMask::empty(),
            priority: 0,
            tier: PerformanceTier::Standard,
            factory: None,
            dependencies: Vec::new(),
            fallback_drivers: Vec::new(),
            memory_overhead_bytes: 0,
            supports_hot_swap: false,
            description: "",
        };
        let err = registry.register("audio", info).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn resolve_is_deterministic_across_repeated_calls() {
        let registry = DriverRegistry::new(ANY_PLATFORM, None);
        let (a_info, _a) = info_for("a", 10, true);
        let (b_info, _b) = info_for("b", 10, true);
        registry.register("audio", a_info).unwrap();
        registry.register("audio", b_info).unwrap();

        let first = registry.resolve("audio", None).unwrap().driver_name();
        let second = registry.resolve("audio", None).unwrap().driver_name();
        assert_eq!(first, second);
        assert_eq!(first, "a");
    }
}
