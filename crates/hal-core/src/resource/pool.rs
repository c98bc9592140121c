//! Typed fixed-block pools keyed by `(ResourceType, block_size)`.

use std::collections::HashMap;

use super::budget::ResourceType;
use crate::error::{codes, Error, ErrorCategory, HalResult};
use crate::sync::{self, Mutex};

/// Configuration for one [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of each block, in bytes.
    pub block_size: usize,
    /// Required alignment of each block, in bytes. Must be a power of two.
    pub alignment: usize,
    /// Number of blocks preallocated at creation.
    pub initial_count: usize,
    /// Upper bound [`PoolManager::resize`] may grow the pool to.
    pub max_count: usize,
    /// Whether concurrent callers are expected; advisory only — the
    /// pool itself always synchronizes internally, but a pool created
    /// with `thread_safe = false` documents that its driver serializes
    /// access and should not be shared across threads.
    pub thread_safe: bool,
}

impl PoolConfig {
    /// Returns `true` if `alignment` is a power of two and `initial_count
    /// <= max_count`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.alignment.is_power_of_two() && self.initial_count <= self.max_count
    }
}

struct PoolInner {
    config: PoolConfig,
    free: Vec<Box<[u8]>>,
    in_use: usize,
}

impl PoolInner {
    fn new(config: PoolConfig) -> Self {
        let free = (0..config.initial_count)
            .map(|_| vec![0u8; config.block_size].into_boxed_slice())
            .collect();
        Self {
            config,
            free,
            in_use: 0,
        }
    }

    fn total_blocks(&self) -> usize {
        self.free.len() + self.in_use
    }
}

/// A preallocated bank of fixed-size blocks for low-latency acquisition.
pub struct Pool {
    inner: Mutex<PoolInner>,
}

impl Pool {
    /// Creates a pool, preallocating `config.initial_count` blocks.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Mutex::new(PoolInner::new(config)),
        }
    }

    /// The pool's static configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        sync::lock(&self.inner).config
    }

    /// Takes a free block, allocating one more if the pool has not yet
    /// reached `max_count`. Returns `None` if the pool is exhausted.
    pub fn take(&self) -> Option<Box<[u8]>> {
        let mut inner = sync::lock(&self.inner);
        if let Some(block) = inner.free.pop() {
            inner.in_use += 1;
            return Some(block);
        }
        if inner.total_blocks() >= inner.config.max_count {
            return None;
        }
        inner.in_use += 1;
        Some(vec![0u8; inner.config.block_size].into_boxed_slice())
    }

    /// Returns a block to the free list.
    pub fn give_back(&self, block: Box<[u8]>) {
        let mut inner = sync::lock(&self.inner);
        inner.in_use = inner.in_use.saturating_sub(1);
        inner.free.push(block);
    }

    /// Number of blocks currently checked out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        sync::lock(&self.inner).in_use
    }

    /// Total blocks (free + in use) the pool currently holds.
    #[must_use]
    pub fn total_blocks(&self) -> usize {
        sync::lock(&self.inner).total_blocks()
    }

    /// Grows or shrinks the pool to `new_count`, never below the number
    /// of blocks currently in use. Shrinking drops free blocks down to
    /// `max(new_count, in_use)`; growing preallocates up to `new_count`,
    /// clamped to `max_count`.
    pub fn resize(&self, new_count: usize) {
        let mut inner = sync::lock(&self.inner);
        let floor = inner.in_use;
        let target = new_count.clamp(floor, inner.config.max_count);
        let block_size = inner.config.block_size;
        loop {
            let current = inner.total_blocks();
            if current == target {
                break;
            }
            if current < target {
                inner.free.push(vec![0u8; block_size].into_boxed_slice());
            } else if inner.free.pop().is_none() {
                break;
            }
        }
    }
}

/// Owns every [`Pool`], keyed by `(ResourceType, block_size)`.
#[derive(Default)]
pub struct PoolManager {
    pools: Mutex<HashMap<(ResourceType, usize), Pool>>,
}

impl PoolManager {
    /// Creates an empty pool manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Creates (or replaces) the pool for `(resource_type,
    /// config.block_size)`. Fails with `Configuration/invalid_parameter`
    /// if `config` is invalid.
    pub fn create_pool(&self, resource_type: ResourceType, config: PoolConfig) -> HalResult<()> {
        if !config.is_valid() {
            return Err(Error::new(
                ErrorCategory::Configuration,
                codes::configuration::INVALID_PARAMETER,
                "pool config has non-power-of-two alignment or initial_count > max_count",
            )
            .with_context("PoolManager::create_pool"));
        }
        sync::lock(&self.pools).insert((resource_type, config.block_size), Pool::new(config));
        Ok(())
    }

    /// Resizes the pool for `(resource_type, block_size)` to `new_count`,
    /// a no-op if no such pool exists.
    pub fn resize(&self, resource_type: ResourceType, block_size: usize, new_count: usize) {
        if let Some(pool) = sync::lock(&self.pools).get(&(resource_type, block_size)) {
            pool.resize(new_count);
        }
    }

    /// Takes a block from the pool for `(resource_type, block_size)`.
    /// Returns `None` if no such pool was created or it is exhausted.
    pub fn take(&self, resource_type: ResourceType, block_size: usize) -> Option<Box<[u8]>> {
        sync::lock(&self.pools)
            .get(&(resource_type, block_size))
            .and_then(Pool::take)
    }

    /// Returns a block to the pool for `(resource_type, block_size)`. A
    /// no-op (the block is dropped) if no such pool exists.
    pub fn give_back(&self, resource_type: ResourceType, block_size: usize, block: Box<[u8]>) {
        if let Some(pool) = sync::lock(&self.pools).get(&(resource_type, block_size)) {
            pool.give_back(block);
        }
    }
}
