//! TTL-bounded capability cache with LRU+access-count eviction, optional
//! persistence, and background refresh.

pub mod persist;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{codes, Error, ErrorCategory, HalResult};
use crate::sync::{self, Mutex};

/// Computes a stable, run-independent fingerprint for `value`.
///
/// Uses [`std::collections::hash_map::DefaultHasher`], whose default
/// construction seeds with fixed keys (unlike `RandomState`), so the
/// same input produces the same fingerprint across process runs, which
/// cache keys depend on for cross-run stability.
#[must_use]
pub fn fingerprint<T: Hash>(value: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Codec for cache-stored values, used both for persistence and as the
/// generic bound on [`CapabilityCache`]. Implemented trivially for
/// `Vec<u8>` since the wire contract treats values as opaque byte
/// strings; domain types can implement it to store themselves directly.
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Serializes this value to its opaque byte representation.
    fn to_bytes(&self) -> Vec<u8>;
    /// Deserializes a value previously produced by `to_bytes`.
    fn from_bytes(bytes: &[u8]) -> HalResult<Self>
    where
        Self: Sized;
}

impl CacheValue for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> HalResult<Self> {
        Ok(bytes.to_vec())
    }
}

/// Reason a cache entry was removed, passed to invalidation listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationReason {
    /// `now > expires_at` at access or compaction time.
    Expired,
    /// Explicit caller-driven [`CapabilityCache::invalidate`].
    Manual,
    /// The underlying hardware changed since this entry was produced.
    HardwareChange,
    /// A driver update invalidated cached results it had contributed to.
    DriverUpdate,
    /// A configuration change invalidated dependent cached results.
    ConfigChange,
    /// The entry was evicted to relieve memory pressure.
    MemoryPressure,
    /// Replaced by a successful background refresh pass.
    BackgroundRefresh,
}

/// Bookkeeping carried alongside each cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Milliseconds since the Unix epoch when this entry was inserted.
    pub created_at_ms: u64,
    /// Milliseconds since the Unix epoch of the most recent `get` hit.
    pub last_accessed_ms: u64,
    /// Milliseconds since the Unix epoch after which the entry is stale.
    pub expires_at_ms: u64,
    /// Lifetime hit count.
    pub access_count: u64,
    /// Marked by the owner when the value may no longer reflect reality,
    /// making it eligible for the next background refresh pass.
    pub dirty: bool,
    /// Free-form label naming what produced this value (e.g. `"probe"`).
    pub source: String,
    /// Content hash of the value at insertion time, for change detection.
    pub content_hash: u64,
}

/// One cached `(key, value)` pair plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRecord<V: CacheValue> {
    /// The fingerprint this record is stored under.
    pub key: u64,
    /// The cached value.
    pub value: V,
    /// Bookkeeping metadata.
    pub metadata: RecordMetadata,
}

/// Cache sizing, TTL bounds, and feature toggles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    /// TTL applied when [`CapabilityCache::put`] is not given an explicit
    /// override.
    pub default_ttl: Duration,
    /// Floor every TTL (explicit or default) is clamped to.
    pub min_ttl: Duration,
    /// Ceiling every TTL (explicit or default) is clamped to.
    pub max_ttl: Duration,
    /// Eviction triggers once the entry count exceeds this.
    pub max_entries: usize,
    /// Eviction triggers once the summed `value.to_bytes().len()` exceeds
    /// this.
    pub max_memory_bytes: u64,
    /// Whether `save`/`load` against the configured [`PersistentCache`]
    /// are exercised at all.
    pub enable_persistence: bool,
    /// Whether a background refresh thread is started.
    pub enable_background_refresh: bool,
    /// Interval between background refresh passes.
    pub background_interval: Duration,
    /// Target hit ratio, tracked as a metric only; no action is taken
    /// when it is missed.
    pub hit_ratio_target: f64,
    /// Whether persisted snapshots are compressed. No compression codec
    /// is bundled (not this crate's job); the flag is carried through
    /// for a future `PersistentCache` implementation to honor.
    pub enable_compression: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            min_ttl: Duration::from_secs(1),
            max_ttl: Duration::from_secs(3600),
            max_entries: 1024,
            max_memory_bytes: 16 * 1024 * 1024,
            enable_persistence: false,
            enable_background_refresh: false,
            background_interval: Duration::from_secs(60),
            hit_ratio_target: 0.9,
            enable_compression: false,
        }
    }
}

/// Persistence collaborator: serializes/restores whatever opaque
/// byte-string the cache hands it. A real implementation writes to a
/// file or platform store; [`NullPersistentCache`] is the in-memory
/// reference used by tests and as the default when persistence is
/// enabled without an external store configured.
pub trait PersistentCache: Send + Sync {
    /// Loads the last saved snapshot, if any.
    fn load(&self) -> HalResult<Option<Vec<u8>>>;
    /// Overwrites the stored snapshot.
    fn save(&self, bytes: &[u8]) -> HalResult<()>;
    /// Deletes any stored snapshot.
    fn clear(&self) -> HalResult<()>;
    /// Changes the path/identifier snapshots are stored under.
    fn set_path(&self, path: &str) -> HalResult<()>;
    /// Size in bytes of the currently stored snapshot, `0` if none.
    fn size(&self) -> HalResult<u64>;
}

/// In-memory [`PersistentCache`]: round-trips a snapshot for the
/// lifetime of the process without touching any real storage.
#[derive(Default)]
pub struct NullPersistentCache {
    snapshot: Mutex<Option<Vec<u8>>>,
    path: Mutex<String>,
}

impl PersistentCache for NullPersistentCache {
    fn load(&self) -> HalResult<Option<Vec<u8>>> {
        Ok(sync::lock(&self.snapshot).clone())
    }

    fn save(&self, bytes: &[u8]) -> HalResult<()> {
        *sync::lock(&self.snapshot) = Some(bytes.to_vec());
        Ok(())
    }

    fn clear(&self) -> HalResult<()> {
        *sync::lock(&self.snapshot) = None;
        Ok(())
    }

    fn set_path(&self, path: &str) -> HalResult<()> {
        *sync::lock(&self.path) = path.to_owned();
        Ok(())
    }

    fn size(&self) -> HalResult<u64> {
        Ok(sync::lock(&self.snapshot).as_ref().map_or(0, |bytes| bytes.len() as u64))
    }
}

/// Refreshes a single entry during a background pass.
pub trait CacheUpdater<V: CacheValue>: Send + Sync {
    /// Recomputes the value for `key`, or `None` if it can no longer be
    /// produced (the entry is dropped without replacement).
    fn refresh(&self, key: u64) -> Option<V>;
}

struct CacheInner<V: CacheValue> {
    config: CacheConfig,
    records: HashMap<u64, CapabilityRecord<V>>,
}

/// TTL cache keyed by content fingerprint, with LRU+access-count
/// eviction, optional persistence, and optional background refresh.
pub struct CapabilityCache<V: CacheValue> {
    inner: Mutex<CacheInner<V>>,
    listeners: Mutex<Vec<Arc<dyn Fn(u64, InvalidationReason) + Send + Sync>>>,
    persistent: Option<Arc<dyn PersistentCache>>,
    shutdown: AtomicBool,
    background_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<V: CacheValue> CapabilityCache<V> {
    /// Creates a cache with `config` and no persistence backend.
    #[must_use]
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Self::with_persistence(config, None)
    }

    /// Creates a cache with `config`, optionally backed by `persistent`.
    /// If `config.enable_persistence` is `true` and `persistent` is
    /// `None`, an in-memory [`NullPersistentCache`] is used so
    /// persistence-on still round-trips without requiring real storage.
    #[must_use]
    pub fn with_persistence(config: CacheConfig, persistent: Option<Arc<dyn PersistentCache>>) -> Arc<Self> {
        let persistent = if config.enable_persistence {
            Some(persistent.unwrap_or_else(|| Arc::new(NullPersistentCache::default()) as Arc<dyn PersistentCache>))
        } else {
            None
        };
        Arc::new(Self {
            inner: Mutex::new(CacheInner {
                config,
                records: HashMap::new(),
            }),
            listeners: Mutex::new(Vec::new()),
            persistent,
            shutdown: AtomicBool::new(false),
            background_thread: Mutex::new(None),
        })
    }

    /// Registers a listener invoked whenever an entry is invalidated.
    pub fn on_invalidate(&self, listener: Arc<dyn Fn(u64, InvalidationReason) + Send + Sync>) {
        sync::lock(&self.listeners).push(listener);
    }

    /// Looks up `key`, refreshing `last_accessed`/`access_count` on hit.
    /// Returns `None` (a miss) if absent or expired; an expired entry is
    /// removed as a side effect, notifying listeners with
    /// [`InvalidationReason::Expired`].
    pub fn get(&self, key: u64) -> Option<V> {
        let now = now_ms();
        let mut inner = sync::lock(&self.inner);
        let expired = matches!(inner.records.get(&key), Some(record) if now > record.metadata.expires_at_ms);
        if expired {
            inner.records.remove(&key);
            drop(inner);
            self.notify(key, InvalidationReason::Expired);
            return None;
        }
        let record = inner.records.get_mut(&key)?;
        record.metadata.last_accessed_ms = now;
        record.metadata.access_count += 1;
        Some(record.value.clone())
    }

    /// Inserts or replaces `key`. `ttl` overrides `config.default_ttl`,
    /// clamped to `[min_ttl, max_ttl]`. May trigger eviction if the cache
    /// is now over `max_entries` or `max_memory_bytes`.
    pub fn put(&self, key: u64, value: V, ttl: Option<Duration>, source: &str) {
        let now = now_ms();
        let mut inner = sync::lock(&self.inner);
        let ttl = clamp_ttl(ttl.unwrap_or(inner.config.default_ttl), &inner.config);
        let content_hash = fingerprint(&value.to_bytes());
        inner.records.insert(
            key,
            CapabilityRecord {
                key,
                value,
                metadata: RecordMetadata {
                    created_at_ms: now,
                    last_accessed_ms: now,
                    expires_at_ms: now + ttl.as_millis() as u64,
                    access_count: 0,
                    dirty: false,
                    source: source.to_owned(),
                    content_hash,
                },
            },
        );
        let evicted = evict_over_capacity(&mut inner, now);
        drop(inner);
        for (evicted_key, reason) in evicted {
            self.notify(evicted_key, reason);
        }
    }

    /// Removes `key` if present, notifying listeners with `reason`.
    pub fn invalidate(&self, key: u64, reason: InvalidationReason) {
        let removed = sync::lock(&self.inner).records.remove(&key).is_some();
        if removed {
            self.notify(key, reason);
        }
    }

    /// Marks `key` dirty, making it eligible for the next background
    /// refresh pass. A no-op if `key` is absent.
    pub fn mark_dirty(&self, key: u64) {
        if let Some(record) = sync::lock(&self.inner).records.get_mut(&key) {
            record.metadata.dirty = true;
        }
    }

    /// Current number of live entries (expired-but-not-yet-compacted
    /// entries still count until the next `get`/compaction touches
    /// them).
    #[must_use]
    pub fn len(&self) -> usize {
        sync::lock(&self.inner).records.len()
    }

    /// Whether the cache currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry, notifying listeners for each.
    pub fn compact(&self) {
        let now = now_ms();
        let expired_keys: Vec<u64> = {
            let inner = sync::lock(&self.inner);
            inner
                .records
                .values()
                .filter(|record| now > record.metadata.expires_at_ms)
                .map(|record| record.key)
                .collect()
        };
        for key in expired_keys {
            self.invalidate(key, InvalidationReason::Expired);
        }
    }

    /// Runs one background refresh pass: every entry that is `dirty` or
    /// within `background_interval` of expiring is invalidated with
    /// [`InvalidationReason::BackgroundRefresh`] and, if `updater`
    /// produces a new value, reinserted under the same TTL policy.
    /// Returns the keys actually refreshed.
    pub fn run_background_refresh_pass(&self, updater: &dyn CacheUpdater<V>) -> Vec<u64> {
        let now = now_ms();
        let due: Vec<u64> = {
            let inner = sync::lock(&self.inner);
            let horizon = inner.config.background_interval.as_millis() as u64;
            inner
                .records
                .values()
                .filter(|record| {
                    record.metadata.dirty || record.metadata.expires_at_ms.saturating_sub(now) <= horizon
                })
                .map(|record| record.key)
                .collect()
        };

        let mut refreshed = Vec::new();
        for key in due {
            self.invalidate(key, InvalidationReason::BackgroundRefresh);
            if let Some(value) = updater.refresh(key) {
                self.put(key, value, None, "background_refresh");
                refreshed.push(key);
            }
        }
        refreshed
    }

    /// Starts a background thread that calls
    /// [`CapabilityCache::run_background_refresh_pass`] on
    /// `config.background_interval`, if `config.enable_background_refresh`
    /// is set. A no-op otherwise.
    pub fn start_background_refresh(self: &Arc<Self>, updater: Arc<dyn CacheUpdater<V>>) {
        let interval = {
            let inner = sync::lock(&self.inner);
            if !inner.config.enable_background_refresh {
                return;
            }
            inner.config.background_interval
        };
        let cache = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("hal-cache-refresh".to_owned())
            .spawn(move || {
                while !cache.shutdown.load(Ordering::Acquire) {
                    std::thread::sleep(interval);
                    if cache.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    cache.run_background_refresh_pass(updater.as_ref());
                }
            })
            .expect("failed to spawn cache background refresh thread");
        *sync::lock(&self.background_thread) = Some(handle);
    }

    /// Stops the background refresh thread, if running.
    pub fn stop_background_refresh(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = sync::lock(&self.background_thread).take() {
            let _ = handle.join();
        }
    }

    /// Serializes every live entry and writes it through the configured
    /// [`PersistentCache`]. Fails with the underlying store's error if
    /// persistence is disabled or the write fails; in-memory state is
    /// never corrupted by a failed save.
    pub fn save(&self) -> HalResult<()> {
        let Some(persistent) = &self.persistent else {
            return Err(persistence_disabled());
        };
        let records: Vec<CapabilityRecord<V>> = sync::lock(&self.inner).records.values().cloned().collect();
        let bytes = persist::encode_snapshot(&records);
        persistent.save(&bytes)
    }

    /// Loads a previously saved snapshot and merges it into the
    /// in-memory store (existing entries are overwritten by matching
    /// keys from the snapshot). A load failure or missing snapshot
    /// leaves in-memory state untouched.
    pub fn load(&self) -> HalResult<()> {
        let Some(persistent) = &self.persistent else {
            return Err(persistence_disabled());
        };
        let Some(bytes) = persistent.load()? else {
            return Ok(());
        };
        let records: Vec<CapabilityRecord<V>> = persist::decode_snapshot(&bytes)?;
        let mut inner = sync::lock(&self.inner);
        for record in records {
            inner.records.insert(record.key, record);
        }
        Ok(())
    }

    fn notify(&self, key: u64, reason: InvalidationReason) {
        for listener in sync::lock(&self.listeners).iter() {
            listener(key, reason);
        }
    }
}

impl<V: CacheValue> Drop for CapabilityCache<V> {
    fn drop(&mut self) {
        self.stop_background_refresh();
    }
}

fn clamp_ttl(ttl: Duration, config: &CacheConfig) -> Duration {
    ttl.clamp(config.min_ttl, config.max_ttl)
}

/// Evicts entries until the cache satisfies both `max_entries` and
/// `max_memory_bytes`. Already-expired entries are reclaimed first
/// (reported as [`InvalidationReason::Expired`]); once none remain,
/// falls back to LRU order (ties by smallest `access_count`, then oldest
/// `created_at`), reported as [`InvalidationReason::MemoryPressure`].
/// Returns the evicted keys paired with the reason each was removed for.
fn evict_over_capacity<V: CacheValue>(inner: &mut CacheInner<V>, now: u64) -> Vec<(u64, InvalidationReason)> {
    fn lru_key(record: &RecordMetadata) -> (u64, u64, u64) {
        (record.last_accessed_ms, record.access_count, record.created_at_ms)
    }

    let mut evicted = Vec::new();
    loop {
        let over_count = inner.records.len() > inner.config.max_entries;
        let total_bytes: u64 = inner
            .records
            .values()
            .map(|record| record.value.to_bytes().len() as u64)
            .sum();
        let over_memory = total_bytes > inner.config.max_memory_bytes;
        if !over_count && !over_memory {
            break;
        }
        let expired_victim = inner
            .records
            .values()
            .filter(|record| now > record.metadata.expires_at_ms)
            .min_by_key(|record| lru_key(&record.metadata))
            .map(|record| record.key);
        let (victim, reason) = if let Some(key) = expired_victim {
            (key, InvalidationReason::Expired)
        } else {
            let Some(key) = inner
                .records
                .values()
                .min_by_key(|record| lru_key(&record.metadata))
                .map(|record| record.key)
            else {
                break;
            };
            (key, InvalidationReason::MemoryPressure)
        };
        inner.records.remove(&victim);
        evicted.push((victim, reason));
    }
    evicted
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn persistence_disabled() -> Error {
    Error::new(
        ErrorCategory::Configuration,
        codes::configuration::MISSING_CONFIG,
        "capability cache persistence is not enabled",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_cache(max_entries: usize) -> Arc<CapabilityCache<Vec<u8>>> {
        CapabilityCache::new(CacheConfig {
            max_entries,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = bytes_cache(10);
        cache.put(1, vec![9, 9], None, "test");
        assert_eq!(cache.get(1), Some(vec![9, 9]));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let cache = bytes_cache(10);
        cache.put(1, vec![1], Some(Duration::from_millis(1)), "test");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn eviction_prefers_least_recently_accessed_then_lowest_access_count() {
        let cache = bytes_cache(2);
        cache.put(1, vec![1], Some(Duration::from_secs(10)), "t");
        std::thread::sleep(Duration::from_millis(5));
        cache.put(2, vec![2], Some(Duration::from_secs(10)), "t");
        std::thread::sleep(Duration::from_millis(5));
        // Touch key 1 so it is more recently accessed than key 2.
        cache.get(1);
        std::thread::sleep(Duration::from_millis(5));

        cache.put(3, vec![3], Some(Duration::from_secs(10)), "t");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(2), None);
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn capacity_overflow_reclaims_the_already_expired_entry_first() {
        // max_entries = 3; A expires quickly, B and C do not. Once A has
        // expired, inserting D should reclaim A specifically (reason
        // Expired), not whichever entry LRU would otherwise pick.
        let cache = CapabilityCache::<Vec<u8>>::new(CacheConfig {
            max_entries: 3,
            min_ttl: Duration::from_millis(1),
            ..CacheConfig::default()
        });
        let observed: Arc<std::sync::Mutex<Vec<(u64, InvalidationReason)>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        cache.on_invalidate(Arc::new(move |key, reason| {
            observed_clone.lock().unwrap().push((key, reason));
        }));

        cache.put(1, vec![1], Some(Duration::from_millis(1)), "a");
        cache.put(2, vec![2], Some(Duration::from_secs(10)), "b");
        cache.put(3, vec![3], Some(Duration::from_secs(10)), "c");
        std::thread::sleep(Duration::from_millis(20));

        cache.put(4, vec![4], Some(Duration::from_secs(10)), "d");

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(1), None);
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
        assert!(cache.get(4).is_some());
        assert_eq!(*observed.lock().unwrap(), vec![(1, InvalidationReason::Expired)]);
    }

    #[test]
    fn invalidate_notifies_listeners_with_reason() {
        let cache = bytes_cache(10);
        let observed: Arc<std::sync::Mutex<Vec<InvalidationReason>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        cache.on_invalidate(Arc::new(move |_key, reason| {
            observed_clone.lock().unwrap().push(reason);
        }));
        cache.put(1, vec![1], None, "t");
        cache.invalidate(1, InvalidationReason::ConfigChange);
        assert_eq!(*observed.lock().unwrap(), vec![InvalidationReason::ConfigChange]);
    }

    #[test]
    fn save_without_persistence_enabled_fails() {
        let cache = bytes_cache(10);
        assert!(cache.save().is_err());
    }

    #[test]
    fn save_and_load_round_trip_through_a_shared_backend() {
        let backend: Arc<dyn PersistentCache> = Arc::new(NullPersistentCache::default());
        let persisted_config = CacheConfig {
            enable_persistence: true,
            ..CacheConfig::default()
        };

        let writer = CapabilityCache::<Vec<u8>>::with_persistence(persisted_config, Some(Arc::clone(&backend)));
        writer.put(9, vec![9], Some(Duration::from_secs(60)), "probe");
        writer.save().unwrap();

        let reader = CapabilityCache::<Vec<u8>>::with_persistence(persisted_config, Some(backend));
        reader.load().unwrap();
        assert_eq!(reader.get(9), Some(vec![9]));
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        assert_eq!(fingerprint(&"same input"), fingerprint(&"same input"));
    }

    proptest::proptest! {
        /// Whatever last_accessed/access_count/created_at triples are fed
        /// in, the single entry evicted to satisfy `max_entries == n - 1`
        /// is always the one with the smallest
        /// `(last_accessed, access_count, created_at)` tuple.
        #[test]
        fn eviction_always_picks_the_smallest_lru_tuple(
            triples in proptest::collection::vec((0u64..1000, 0u64..50, 0u64..1000), 2..8),
        ) {
            let mut inner = CacheInner {
                config: CacheConfig {
                    max_entries: triples.len() - 1,
                    ..CacheConfig::default()
                },
                records: HashMap::new(),
            };
            for (key, (last_accessed, access_count, created_at)) in triples.iter().enumerate() {
                inner.records.insert(key as u64, CapabilityRecord {
                    key: key as u64,
                    value: Vec::<u8>::new(),
                    metadata: RecordMetadata {
                        created_at_ms: *created_at,
                        last_accessed_ms: *last_accessed,
                        expires_at_ms: u64::MAX,
                        access_count: *access_count,
                        dirty: false,
                        source: "test".to_owned(),
                        content_hash: 0,
                    },
                });
            }

            let expected_victim = triples
                .iter()
                .enumerate()
                .min_by_key(|(_, t)| *t)
                .map(|(idx, _)| idx as u64)
                .unwrap();

            let evicted = evict_over_capacity(&mut inner, 0);
            proptest::prop_assert_eq!(evicted, vec![(expected_victim, InvalidationReason::MemoryPressure)]);
        }
    }
}
