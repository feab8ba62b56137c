use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-key mutexes.
///
/// The first caller for a key creates its lock; later callers wait on the same one. An entry is
/// dropped from the registry as soon as no holder or waiter references it, so the map only ever
/// holds keys with work in flight.
///
/// Both sync (worker threads) and async (coordination task) acquisition are supported.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl std::fmt::Debug for KeyedLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Held per-key lock. Releases (and prunes the registry entry) on drop.
pub struct KeyedGuard {
    key: String,
    registry: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock();
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire from async code.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let guard = self.entry(key).lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            registry: self.inner.clone(),
            guard: Some(guard),
        }
    }

    /// Acquire from a blocking context.
    ///
    /// Must not be called from inside an async runtime thread.
    pub fn lock_blocking(&self, key: &str) -> KeyedGuard {
        let guard = self.entry(key).blocking_lock_owned();
        KeyedGuard {
            key: key.to_string(),
            registry: self.inner.clone(),
            guard: Some(guard),
        }
    }

    /// Keys with a holder or waiter.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}

impl KeyedGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let lock = OwnedMutexGuard::mutex(&guard).clone();
        drop(guard);

        // Clones are only made under the registry lock, so the count is stable here:
        // one for the map and one for `lock` means nobody else is holding or waiting.
        let mut map = self.registry.lock();
        if Arc::strong_count(&lock) == 2
            && map
                .get(&self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &lock))
        {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/keyed_lock.rs"]
mod tests;
