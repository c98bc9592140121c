//! Typed resource handles, budgets, pressure, reclamation, and pool
//! allocators.

pub mod budget;
pub mod handle;
pub mod pool;
pub mod pressure;

pub use budget::{AcquisitionMode, ResourceBudget, ResourceStats, ResourceType};
pub use handle::{ResourceHandle, ScopedResource};
pub use pool::{Pool, PoolConfig, PoolManager};
pub use pressure::{compute_pressure, ResourcePressure, HYSTERESIS_POINTS};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{codes, Error, ErrorCategory, HalResult};
use crate::event::{EventBus, EventCategory, EventDraft, EventPayload, EventSeverity, SystemEventPayload};
use crate::sync::{self, Condvar, Mutex, RwLock};

/// Invoked under `Emergency` acquisition to free bytes. Receives the
/// still-outstanding deficit and returns how many bytes it actually
/// freed; may return less than requested, or zero.
pub type ReclamationCallback = Arc<dyn Fn(u64) -> u64 + Send + Sync>;

/// Invoked whenever a resource type's pressure level changes.
pub type PressureCallback = Arc<dyn Fn(ResourceType, ResourcePressure) + Send + Sync>;

struct ReclaimEntry {
    name: &'static str,
    /// Bytes this callback most recently allocated; used to order
    /// emergency reclamation largest-allocation-first.
    recent_allocation_bytes: AtomicU64,
    callback: ReclamationCallback,
}

struct OutstandingHandle {
    owner_driver: &'static str,
    size_bytes: u64,
}

struct TypeState {
    budget: ResourceBudget,
    stats: ResourceStats,
    pressure: ResourcePressure,
    reclaimers: Vec<ReclaimEntry>,
    pressure_callback: Option<PressureCallback>,
    outstanding: HashMap<u64, OutstandingHandle>,
}

impl TypeState {
    fn new(budget: ResourceBudget) -> Self {
        Self {
            budget,
            stats: ResourceStats::default(),
            pressure: ResourcePressure::None,
            reclaimers: Vec::new(),
            pressure_callback: None,
            outstanding: HashMap::new(),
        }
    }
}

struct TypeSlot {
    state: Mutex<TypeState>,
    has_space: Condvar,
}

/// Enforces per-resource-type budgets, brokers acquisition modes,
/// maintains pressure, and triggers reclamation.
pub struct ResourceManager {
    types: RwLock<HashMap<ResourceType, Arc<TypeSlot>>>,
    pools: PoolManager,
    next_handle_id: AtomicU64,
    events: Option<Arc<EventBus>>,
}

impl ResourceManager {
    /// Creates an empty resource manager. Pass `events` to emit
    /// `Resource` category pressure-change events; `None` disables
    /// emission.
    #[must_use]
    pub fn new(events: Option<Arc<EventBus>>) -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            pools: PoolManager::new(),
            next_handle_id: AtomicU64::new(1),
            events,
        }
    }

    /// The pool manager shared by every resource type.
    #[must_use]
    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    /// Installs (or replaces) the budget for `resource_type`. Fails with
    /// `Configuration/invalid_parameter` if the budget violates its own
    /// invariants.
    pub fn set_budget(&self, resource_type: ResourceType, budget: ResourceBudget) -> HalResult<()> {
        if !budget.is_valid() {
            return Err(Error::new(
                ErrorCategory::Configuration,
                codes::configuration::INVALID_PARAMETER,
                "resource budget violates reserved<=max or warning<=critical<=100",
            )
            .with_context("ResourceManager::set_budget"));
        }
        let mut types = sync::write(&self.types);
        match types.get(&resource_type) {
            Some(slot) => sync::lock(&slot.state).budget = budget,
            None => {
                types.insert(resource_type, Arc::new(TypeSlot {
                    state: Mutex::new(TypeState::new(budget)),
                    has_space: Condvar::new(),
                }));
            }
        }
        Ok(())
    }

    /// Registers a reclamation callback invoked during `Emergency`
    /// acquisition, ordered largest-`estimated_bytes`-first.
    pub fn register_reclamation_callback(
        &self,
        resource_type: ResourceType,
        name: &'static str,
        estimated_bytes: u64,
        callback: ReclamationCallback,
    ) {
        let slot = self.slot_or_default(resource_type);
        let mut state = sync::lock(&slot.state);
        state.reclaimers.push(ReclaimEntry {
            name,
            recent_allocation_bytes: AtomicU64::new(estimated_bytes),
            callback,
        });
    }

    /// Registers (replacing any prior) the callback invoked whenever
    /// `resource_type`'s pressure level changes.
    pub fn set_pressure_callback(&self, resource_type: ResourceType, callback: PressureCallback) {
        let slot = self.slot_or_default(resource_type);
        sync::lock(&slot.state).pressure_callback = Some(callback);
    }

    fn slot_or_default(&self, resource_type: ResourceType) -> Arc<TypeSlot> {
        if let Some(slot) = sync::read(&self.types).get(&resource_type) {
            return Arc::clone(slot);
        }
        let mut types = sync::write(&self.types);
        Arc::clone(types.entry(resource_type).or_insert_with(|| {
            Arc::new(TypeSlot {
                state: Mutex::new(TypeState::new(ResourceBudget {
                    max_bytes: u64::MAX,
                    reserved_bytes: 0,
                    warning_pct: 70,
                    critical_pct: 95,
                    allow_reclamation: true,
                    timeout: Duration::from_secs(5),
                })),
                has_space: Condvar::new(),
            })
        }))
    }

    /// Acquires `size_bytes` of `resource_type` on behalf of
    /// `owner_driver`, under `mode`. See the component design for the
    /// full four-mode algorithm.
    pub fn acquire(
        &self,
        resource_type: ResourceType,
        size_bytes: u64,
        owner_driver: &'static str,
        mode: AcquisitionMode,
    ) -> HalResult<ResourceHandle> {
        let slot = self.slot_or_default(resource_type);
        let mut state = sync::lock(&slot.state);

        // Fixed once per call: a `Blocking`/`Timeout` acquire must not have
        // its wait window reset by repeated spurious or insufficient
        // wake-ups.
        let deadline = Instant::now()
            + match mode {
                AcquisitionMode::Timeout(duration) => duration,
                _ => state.budget.timeout,
            };

        loop {
            let available = state.budget.available_bytes();
            let current = state.stats.current_usage_bytes;
            if current.saturating_add(size_bytes) <= available {
                break;
            }
            match mode {
                AcquisitionMode::NonBlocking => {
                    state.stats.failed_acquisitions += 1;
                    return Err(exhausted());
                }
                AcquisitionMode::Blocking | AcquisitionMode::Timeout(_) => {
                    let (next_state, timed_out) =
                        sync::wait_timeout(&slot.has_space, state, remaining(deadline));
                    state = next_state;
                    if timed_out && Instant::now() >= deadline {
                        let available = state.budget.available_bytes();
                        if state.stats.current_usage_bytes.saturating_add(size_bytes) > available {
                            state.stats.failed_acquisitions += 1;
                            return Err(locked());
                        }
                    }
                }
                AcquisitionMode::Emergency => {
                    if !state.budget.allow_reclamation {
                        state.stats.failed_acquisitions += 1;
                        return Err(out_of_memory());
                    }
                    let deficit = (current + size_bytes).saturating_sub(available);
                    let freed = reclaim(&mut state, deficit);
                    if freed < deficit {
                        state.stats.failed_acquisitions += 1;
                        return Err(out_of_memory());
                    }
                }
            }
        }

        state.stats.total_acquired_bytes += size_bytes;
        state.stats.current_usage_bytes += size_bytes;
        let handle_id = self.next_handle_id.fetch_add(1, Ordering::AcqRel);
        state.outstanding.insert(
            handle_id,
            OutstandingHandle {
                owner_driver,
                size_bytes,
            },
        );
        self.update_pressure(resource_type, &mut state);
        drop(state);

        Ok(ResourceHandle::new(resource_type, handle_id, owner_driver, size_bytes))
    }

    /// Releases a previously acquired handle, validating its owner and
    /// liveness. Fails with `Validation/invalid_state` if the handle is
    /// unknown or its recorded owner does not match.
    pub fn release(&self, handle: ResourceHandle) -> HalResult<()> {
        let slot = self.slot_or_default(handle.resource_type());
        let mut state = sync::lock(&slot.state);
        let Some(outstanding) = state.outstanding.remove(&handle.id()) else {
            return Err(invalid_state());
        };
        if outstanding.owner_driver != handle.owner_driver() {
            state.outstanding.insert(handle.id(), outstanding);
            return Err(invalid_state());
        }
        state.stats.total_released_bytes += outstanding.size_bytes;
        state.stats.current_usage_bytes =
            state.stats.current_usage_bytes.saturating_sub(outstanding.size_bytes);
        self.update_pressure(handle.resource_type(), &mut state);
        drop(state);
        slot.has_space.notify_all();
        Ok(())
    }

    /// Wraps `handle` in a [`ScopedResource`] bound to this manager.
    ///
    /// Requires `self` be held through an `Arc` since the scoped wrapper
    /// must outlive the call that created it.
    #[must_use]
    pub fn scoped(self: &Arc<Self>, handle: ResourceHandle) -> ScopedResource {
        ScopedResource::new(handle, Arc::clone(self))
    }

    /// Point-in-time counters for `resource_type`.
    #[must_use]
    pub fn stats(&self, resource_type: ResourceType) -> ResourceStats {
        sync::lock(&self.slot_or_default(resource_type).state).stats
    }

    /// Current pressure level for `resource_type`.
    #[must_use]
    pub fn pressure(&self, resource_type: ResourceType) -> ResourcePressure {
        sync::lock(&self.slot_or_default(resource_type).state).pressure
    }

    fn update_pressure(&self, resource_type: ResourceType, state: &mut TypeState) {
        let next = compute_pressure(state.stats.current_usage_bytes, &state.budget, state.pressure);
        if next == state.pressure {
            return;
        }
        state.pressure = next;
        if let Some(callback) = &state.pressure_callback {
            callback(resource_type, next);
        }
        self.emit_pressure_event(resource_type, next);
    }

    fn emit_pressure_event(&self, resource_type: ResourceType, pressure: ResourcePressure) {
        let Some(bus) = &self.events else {
            return;
        };
        let severity = match pressure {
            ResourcePressure::None | ResourcePressure::Low => EventSeverity::Info,
            ResourcePressure::Medium => EventSeverity::Warning,
            ResourcePressure::High => EventSeverity::Error,
            ResourcePressure::Critical => EventSeverity::Critical,
        };
        bus.publish(EventDraft {
            category: EventCategory::Resource,
            severity,
            source_id: "resource_manager",
            description: format!("{resource_type:?} pressure is now {pressure:?}"),
            attributes: HashMap::new(),
            payload: EventPayload::System(SystemEventPayload {
                subsystem: "resource_manager",
                detail: "pressure_changed",
            }),
        });
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Invokes `state`'s reclamation callbacks largest-recent-allocation
/// first until `deficit` bytes are freed or all callbacks are exhausted.
/// Returns the total bytes freed.
fn reclaim(state: &mut TypeState, deficit: u64) -> u64 {
    let mut order: Vec<usize> = (0..state.reclaimers.len()).collect();
    order.sort_by_key(|&idx| {
        std::cmp::Reverse(state.reclaimers[idx].recent_allocation_bytes.load(Ordering::Relaxed))
    });

    let mut freed = 0u64;
    for idx in order {
        if freed >= deficit {
            break;
        }
        let entry = &state.reclaimers[idx];
        let bytes = (entry.callback)(deficit - freed);
        if bytes > 0 {
            log::info!("reclamation callback '{}' freed {bytes} bytes", entry.name);
        }
        freed += bytes;
    }
    freed
}

fn exhausted() -> Error {
    Error::new(
        ErrorCategory::Resource,
        codes::resource::RESOURCE_EXHAUSTED,
        "resource budget has no headroom for this request",
    )
}

fn locked() -> Error {
    Error::new(
        ErrorCategory::Resource,
        codes::resource::RESOURCE_LOCKED,
        "timed out waiting for resource headroom",
    )
}

fn out_of_memory() -> Error {
    Error::new(
        ErrorCategory::Resource,
        codes::resource::OUT_OF_MEMORY,
        "emergency reclamation could not free enough bytes",
    )
}

fn invalid_state() -> Error {
    Error::new(
        ErrorCategory::Validation,
        codes::validation::INVALID_STATE,
        "resource handle is unknown, already released, or owned by another driver",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max: u64) -> ResourceBudget {
        ResourceBudget {
            max_bytes: max,
            reserved_bytes: 0,
            warning_pct: 70,
            critical_pct: 95,
            allow_reclamation: true,
            timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn acquire_and_release_conserves_current_usage() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(1024)).unwrap();
        let handle = manager
            .acquire(ResourceType::Memory, 512, "driver-a", AcquisitionMode::NonBlocking)
            .unwrap();
        assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 512);
        manager.release(handle).unwrap();
        assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 0);
    }

    #[test]
    fn non_blocking_fails_when_exhausted() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(100)).unwrap();
        manager
            .acquire(ResourceType::Memory, 100, "a", AcquisitionMode::NonBlocking)
            .unwrap();
        let err = manager
            .acquire(ResourceType::Memory, 1, "b", AcquisitionMode::NonBlocking)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resource);
        assert_eq!(err.code(), codes::resource::RESOURCE_EXHAUSTED);
    }

    #[test]
    fn release_rejects_mismatched_owner() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(100)).unwrap();
        let handle = manager
            .acquire(ResourceType::Memory, 10, "owner", AcquisitionMode::NonBlocking)
            .unwrap();
        let forged = ResourceHandle::new(handle.resource_type(), handle.id(), "impostor", handle.size_bytes());
        let err = manager.release(forged).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        // the real handle is still outstanding and releasable
        manager.release(handle).unwrap();
    }

    #[test]
    fn emergency_reclaims_from_largest_callback_first() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(100)).unwrap();
        manager
            .acquire(ResourceType::Memory, 100, "a", AcquisitionMode::NonBlocking)
            .unwrap();

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let order_small = Arc::clone(&order);
        let order_large = Arc::clone(&order);
        manager.register_reclamation_callback(
            ResourceType::Memory,
            "small",
            10,
            Arc::new(move |_deficit| {
                sync::lock(&order_small).push("small");
                10
            }),
        );
        manager.register_reclamation_callback(
            ResourceType::Memory,
            "large",
            50,
            Arc::new(move |_deficit| {
                sync::lock(&order_large).push("large");
                50
            }),
        );

        let handle = manager
            .acquire(ResourceType::Memory, 20, "b", AcquisitionMode::Emergency)
            .unwrap();
        assert_eq!(*sync::lock(&order), vec!["large"]);
        manager.release(handle).unwrap();
    }

    #[test]
    fn pressure_reaches_critical_and_downgrades_with_hysteresis() {
        let manager = Arc::new(ResourceManager::new(None));
        manager
            .set_budget(
                ResourceType::Memory,
                ResourceBudget {
                    max_bytes: 100,
                    reserved_bytes: 0,
                    warning_pct: 70,
                    critical_pct: 95,
                    allow_reclamation: true,
                    timeout: Duration::from_millis(50),
                },
            )
            .unwrap();
        let first = manager
            .acquire(ResourceType::Memory, 90, "a", AcquisitionMode::NonBlocking)
            .unwrap();
        assert_eq!(manager.pressure(ResourceType::Memory), ResourcePressure::Medium);

        let second = manager
            .acquire(ResourceType::Memory, 10, "a", AcquisitionMode::NonBlocking)
            .unwrap();
        assert_eq!(manager.pressure(ResourceType::Memory), ResourcePressure::Critical);

        manager.release(second).unwrap();
        // 90/100 = 90%, 5 points below 95: satisfies hysteresis, drops to Medium.
        assert_eq!(manager.pressure(ResourceType::Memory), ResourcePressure::Medium);
        manager.release(first).unwrap();
    }

    #[test]
    fn scoped_resource_releases_on_drop() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(100)).unwrap();
        {
            let handle = manager
                .acquire(ResourceType::Memory, 10, "a", AcquisitionMode::NonBlocking)
                .unwrap();
            let _scoped = manager.scoped(handle);
            assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 10);
        }
        assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 0);
    }

    #[test]
    fn shared_scoped_resource_releases_only_after_all_shares_drop() {
        let manager = Arc::new(ResourceManager::new(None));
        manager.set_budget(ResourceType::Memory, budget(100)).unwrap();
        let handle = manager
            .acquire(ResourceType::Memory, 10, "a", AcquisitionMode::NonBlocking)
            .unwrap();
        let scoped = manager.scoped(handle);
        let shared = scoped.share();
        drop(scoped);
        assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 10);
        drop(shared);
        assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 0);
    }

    proptest::proptest! {
        /// For any sequence of non-blocking acquisitions that individually
        /// fit under the budget, current_usage always equals the sum of
        /// acquired bytes minus released bytes, and a clean release of
        /// every handle brings it back to zero.
        #[test]
        fn acquire_release_conserves_usage_for_any_sequence(
            sizes in proptest::collection::vec(1u64..100, 1..10),
        ) {
            let manager = Arc::new(ResourceManager::new(None));
            manager.set_budget(ResourceType::Memory, budget(100_000)).unwrap();

            let mut running_total = 0u64;
            let mut handles = Vec::new();
            for size in &sizes {
                let handle = manager
                    .acquire(ResourceType::Memory, *size, "driver-a", AcquisitionMode::NonBlocking)
                    .unwrap();
                running_total += size;
                handles.push(handle);
                proptest::prop_assert_eq!(
                    manager.stats(ResourceType::Memory).current_usage_bytes,
                    running_total
                );
            }

            for handle in handles {
                let size = handle.size_bytes();
                manager.release(handle).unwrap();
                running_total -= size;
                proptest::prop_assert_eq!(
                    manager.stats(ResourceType::Memory).current_usage_bytes,
                    running_total
                );
            }
            proptest::prop_assert_eq!(manager.stats(ResourceType::Memory).current_usage_bytes, 0);
        }
    }
}
