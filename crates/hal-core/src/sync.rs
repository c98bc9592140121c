//! Lock shim selecting real synchronization primitives or `RefCell`-based
//! no-op guards, gated by the `single-threaded` feature.
//!
//! Constrained platforms with no threading capability (e.g. Dreamcast)
//! still run the same component APIs; only the lock implementation
//! changes. This mirrors a capability-gated, profile-selected behavior
//! rather than branching every call site on a runtime flag.

#[cfg(not(feature = "single-threaded"))]
pub use std::sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "single-threaded")]
pub use single_threaded::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Locks `mutex`, recovering the inner guard if a prior holder panicked.
///
/// A poisoned lock only means some other operation panicked while holding
/// it; the data itself is still structurally valid for this runtime's
/// invariants, so recovering and continuing is preferable to propagating
/// the poison to every caller.
#[cfg(not(feature = "single-threaded"))]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(feature = "single-threaded")]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
    }
}

/// Takes the read side of `lock`, recovering from poison as in [`lock`].
#[cfg(not(feature = "single-threaded"))]
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(feature = "single-threaded")]
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
    }
}

/// Takes the write side of `lock`, recovering from poison as in [`lock`].
#[cfg(not(feature = "single-threaded"))]
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(feature = "single-threaded")]
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
    }
}

/// Waits on `condvar` for up to `timeout`, returning the reacquired guard
/// and whether the wait actually timed out. Normalizes the differing
/// return shapes of `std::sync::Condvar` and the single-threaded shim.
#[cfg(not(feature = "single-threaded"))]
pub fn wait_timeout<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: std::time::Duration,
) -> (MutexGuard<'a, T>, bool) {
    condvar
        .wait_timeout(guard, timeout)
        .map(|(guard, status)| (guard, status.timed_out()))
        .unwrap_or_else(|poisoned| {
            let (guard, status) = poisoned.into_inner();
            (guard, status.timed_out())
        })
}

#[cfg(feature = "single-threaded")]
pub fn wait_timeout<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: std::time::Duration,
) -> (MutexGuard<'a, T>, bool) {
    match condvar.wait_timeout(guard, timeout) {
        Ok(result) => result,
    }
}

#[cfg(feature = "single-threaded")]
mod single_threaded {
    use std::cell::{Ref, RefCell, RefMut};
    use std::time::Duration;

    /// Single-threaded stand-in for `std::sync::Mutex` backed by a
    /// `RefCell`. Never actually blocks; cooperative callers are trusted
    /// not to re-enter while holding a guard.
    #[derive(Debug, Default)]
    pub struct Mutex<T> {
        inner: RefCell<T>,
    }

    /// Guard returned by [`Mutex::lock`].
    pub type MutexGuard<'a, T> = RefMut<'a, T>;

    impl<T> Mutex<T> {
        /// Wraps `value`.
        pub const fn new(value: T) -> Self {
            Self {
                inner: RefCell::new(value),
            }
        }

        /// Returns a mutable borrow. Never blocks and never poisons.
        pub fn lock(&self) -> Result<MutexGuard<'_, T>, std::convert::Infallible> {
            Ok(self.inner.borrow_mut())
        }
    }

    /// Single-threaded stand-in for `std::sync::RwLock`.
    #[derive(Debug, Default)]
    pub struct RwLock<T> {
        inner: RefCell<T>,
    }

    /// Shared-borrow guard returned by [`RwLock::read`].
    pub type RwLockReadGuard<'a, T> = Ref<'a, T>;
    /// Exclusive-borrow guard returned by [`RwLock::write`].
    pub type RwLockWriteGuard<'a, T> = RefMut<'a, T>;

    impl<T> RwLock<T> {
        /// Wraps `value`.
        pub const fn new(value: T) -> Self {
            Self {
                inner: RefCell::new(value),
            }
        }

        /// Returns a shared borrow. Never blocks and never poisons.
        pub fn read(&self) -> Result<RwLockReadGuard<'_, T>, std::convert::Infallible> {
            Ok(self.inner.borrow())
        }

        /// Returns an exclusive borrow. Never blocks and never poisons.
        pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>, std::convert::Infallible> {
            Ok(self.inner.borrow_mut())
        }
    }

    /// Single-threaded stand-in for `std::sync::Condvar`. `wait_timeout`
    /// never actually suspends; it returns immediately with a timed-out
    /// status so cooperative callers fall straight through to their
    /// timeout-handling branch.
    #[derive(Debug, Default)]
    pub struct Condvar;

    impl Condvar {
        /// Constructs a no-op condition variable.
        #[must_use]
        pub const fn new() -> Self {
            Self
        }

        /// Returns `guard` back immediately with `timed_out = true`: there
        /// is no other thread that could signal progress.
        pub fn wait_timeout<'a, T>(
            &self,
            guard: MutexGuard<'a, T>,
            _timeout: Duration,
        ) -> Result<(MutexGuard<'a, T>, bool), std::convert::Infallible> {
            Ok((guard, true))
        }

        /// No-op: there are no other threads to wake.
        pub fn notify_all(&self) {}

        /// No-op: there are no other threads to wake.
        pub fn notify_one(&self) {}
    }
}
