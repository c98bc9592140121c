//! Opaque resource handles and their scoped/RAII wrapper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::budget::ResourceType;
use super::ResourceManager;

/// An opaque, unforgeable reference to resource-manager-tracked bytes.
///
/// Handles are minted only by [`ResourceManager::acquire`]; their
/// lifetime must not outlive the issuing driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    resource_type: ResourceType,
    id: u64,
    owner_driver: &'static str,
    size_bytes: u64,
}

impl ResourceHandle {
    pub(super) const fn new(
        resource_type: ResourceType,
        id: u64,
        owner_driver: &'static str,
        size_bytes: u64,
    ) -> Self {
        Self {
            resource_type,
            id,
            owner_driver,
            size_bytes,
        }
    }

    /// The resource class this handle belongs to.
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The handle's unique id within its resource type.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The driver that originally acquired this handle.
    #[must_use]
    pub const fn owner_driver(&self) -> &'static str {
        self.owner_driver
    }

    /// The number of bytes this handle accounts for.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Move-only RAII wrapper around a [`ResourceHandle`] that releases it on
/// every exit path, including error propagation (via `Drop`).
///
/// Calling [`ScopedResource::into_inner`] takes the raw handle out and
/// suppresses the automatic release, transferring ownership to the
/// caller. Calling [`ScopedResource::share`] creates a second strong
/// reference: the underlying resource is only released once every share
/// (including the original) has been released.
pub struct ScopedResource {
    handle: Option<ResourceHandle>,
    manager: Arc<ResourceManager>,
    share_count: Arc<AtomicUsize>,
}

impl ScopedResource {
    pub(super) fn new(handle: ResourceHandle, manager: Arc<ResourceManager>) -> Self {
        Self {
            handle: Some(handle),
            manager,
            share_count: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// The wrapped handle, while still owned.
    #[must_use]
    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle
    }

    /// Takes the raw handle out, suppressing the automatic release on
    /// drop. The caller becomes responsible for eventually releasing it
    /// via [`ResourceManager::release`].
    pub fn into_inner(mut self) -> Option<ResourceHandle> {
        self.share_count.fetch_sub(1, Ordering::AcqRel);
        self.handle.take()
    }

    /// Creates a second strong reference to the same handle, incrementing
    /// the share counter. The underlying resource is released only when
    /// every share (the original and all clones) has been dropped or
    /// released.
    #[must_use]
    pub fn share(&self) -> Self {
        self.share_count.fetch_add(1, Ordering::AcqRel);
        Self {
            handle: self.handle,
            manager: Arc::clone(&self.manager),
            share_count: Arc::clone(&self.share_count),
        }
    }
}

impl Drop for ScopedResource {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.share_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.manager.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceHandle;
    use crate::resource::budget::ResourceType;

    #[test]
    fn handle_exposes_its_fields() {
        let handle = ResourceHandle::new(ResourceType::Memory, 7, "driver-a", 1024);
        assert_eq!(handle.resource_type(), ResourceType::Memory);
        assert_eq!(handle.id(), 7);
        assert_eq!(handle.owner_driver(), "driver-a");
        assert_eq!(handle.size_bytes(), 1024);
    }
}
