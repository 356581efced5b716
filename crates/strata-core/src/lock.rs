//! Per-address locks for read-modify-write sections.
//!
//! The registry hands out one async mutex per exact [`PathAddress`]. Entries
//! are held weakly: once the last [`PathLock`] for an address is dropped the
//! entry is removed, so the table only grows with the number of addresses
//! currently being modified.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use strata_types::PathAddress;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Process-wide table of path locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<PathAddress, Weak<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The lock for `address`.
    ///
    /// Every caller asking for the same address while an earlier handle is
    /// still alive gets the same underlying mutex.
    pub fn get_lock(self: &Arc<Self>, address: &PathAddress) -> PathLock {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        let mutex = match locks.get(address).and_then(Weak::upgrade) {
            Some(existing) => existing,
            None => {
                let mutex = Arc::new(AsyncMutex::new(()));
                locks.insert(address.clone(), Arc::downgrade(&mutex));
                trace!(%address, "path lock created");
                mutex
            }
        };
        PathLock {
            address: address.clone(),
            mutex,
            registry: Arc::downgrade(self),
        }
    }

    /// Number of addresses with a live lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .expect("lock registry poisoned")
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Called while `handle` still holds its strong reference.
    fn release(&self, handle: &PathLock) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // New handles are only created under the table lock, so a count of
        // one means nobody else can be holding or acquiring this mutex.
        if Arc::strong_count(&handle.mutex) == 1 {
            let is_ours = locks
                .get(&handle.address)
                .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(&handle.mutex)));
            if is_ours {
                locks.remove(&handle.address);
                trace!(address = %handle.address, "path lock reclaimed");
            }
        }
    }
}

/// Handle on the lock of one address.
pub struct PathLock {
    address: PathAddress,
    mutex: Arc<AsyncMutex<()>>,
    registry: Weak<LockRegistry>,
}

impl PathLock {
    pub fn address(&self) -> &PathAddress {
        &self.address
    }

    /// Wait for exclusive access to the address.
    ///
    /// The returned guard releases the lock when dropped, including when the
    /// waiting or holding task is cancelled.
    pub async fn lock(self) -> PathLockGuard {
        let guard = Arc::clone(&self.mutex).lock_owned().await;
        PathLockGuard {
            _guard: guard,
            handle: self,
        }
    }

    /// Take the lock if it is free right now.
    pub fn try_lock(self) -> Option<PathLockGuard> {
        let guard = Arc::clone(&self.mutex).try_lock_owned().ok()?;
        Some(PathLockGuard {
            _guard: guard,
            handle: self,
        })
    }

    /// Returns `true` if both handles refer to the same mutex.
    pub fn same_lock(&self, other: &PathLock) -> bool {
        Arc::ptr_eq(&self.mutex, &other.mutex)
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self);
        }
    }
}

impl std::fmt::Debug for PathLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLock")
            .field("address", &self.address)
            .finish()
    }
}

/// Exclusive hold on an address. Dropping it unlocks.
pub struct PathLockGuard {
    // Field order matters: the mutex guard must go before the handle so the
    // handle sees an accurate reference count when it drops.
    _guard: OwnedMutexGuard<()>,
    handle: PathLock,
}

impl PathLockGuard {
    pub fn address(&self) -> &PathAddress {
        self.handle.address()
    }
}

impl std::fmt::Debug for PathLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLockGuard")
            .field("address", self.address())
            .finish()
    }
}
