use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::keyed_lock::{KeyedGuard, KeyedLocks};
use crate::raster::pool::BufferPool;
use crate::request::result::ImageData;

/// Largest share of the budget a single result may take.
const MAX_ENTRY_SHARE: f64 = 0.7;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Counters describing memory cache traffic.
pub struct MemoryCacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries stored.
    pub puts: u64,
    /// Entries evicted to honour the budget.
    pub evictions: u64,
}

struct MemoryEntry {
    data: ImageData,
    bytes: usize,
    last_access: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    total_bytes: usize,
    clock: u64,
    stats: MemoryCacheStats,
}

/// Byte-bounded LRU of delivered results, keyed by cache key.
///
/// Evicted bitmaps nobody else holds go back to the [`BufferPool`].
pub struct MemoryCache {
    max_bytes: usize,
    pool: Arc<BufferPool>,
    state: Mutex<MemoryState>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_bytes", &self.max_bytes)
            .field("size", &self.size())
            .field("len", &self.len())
            .finish()
    }
}

impl MemoryCache {
    /// Cache holding at most `max_bytes` of pixel data. Zero disables it.
    pub fn new(max_bytes: usize, pool: Arc<BufferPool>) -> Self {
        Self {
            max_bytes,
            pool,
            state: Mutex::new(MemoryState::default()),
            locks: KeyedLocks::new(),
        }
    }

    /// Whether anything can be stored.
    pub fn is_enabled(&self) -> bool {
        self.max_bytes > 0
    }

    pub fn max_size(&self) -> usize {
        self.max_bytes
    }

    pub fn size(&self) -> usize {
        self.state.lock().total_bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryCacheStats {
        self.state.lock().stats.clone()
    }

    /// Per-key lock so identical concurrent requests compute once.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        self.locks.lock(key).await
    }

    /// Cached result for `key`. Marks it most recently used.
    pub fn get(&self, key: &str) -> Option<ImageData> {
        let mut st = self.state.lock();
        st.clock = st.clock.saturating_add(1);
        let now = st.clock;
        match st.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                let data = entry.data.clone();
                st.stats.hits = st.stats.hits.saturating_add(1);
                Some(data)
            }
            None => {
                st.stats.misses = st.stats.misses.saturating_add(1);
                None
            }
        }
    }

    /// Store `data` under `key`. Returns `false` when it is too large to cache.
    pub fn put(&self, key: &str, data: ImageData) -> bool {
        let bytes = data.byte_count();
        if !self.is_enabled() || bytes as f64 > self.max_bytes as f64 * MAX_ENTRY_SHARE {
            return false;
        }
        let mut st = self.state.lock();
        st.clock = st.clock.saturating_add(1);
        let last_access = st.clock;
        if let Some(old) = st.entries.insert(
            key.to_string(),
            MemoryEntry {
                data,
                bytes,
                last_access,
            },
        ) {
            st.total_bytes = st.total_bytes.saturating_sub(old.bytes);
            self.release(old.data);
        }
        st.total_bytes = st.total_bytes.saturating_add(bytes);
        st.stats.puts = st.stats.puts.saturating_add(1);

        while st.total_bytes > self.max_bytes {
            let victim = st
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            let Some(victim) = victim else {
                break;
            };
            if let Some(entry) = st.entries.remove(&victim) {
                st.total_bytes = st.total_bytes.saturating_sub(entry.bytes);
                st.stats.evictions = st.stats.evictions.saturating_add(1);
                tracing::debug!(key = %victim, bytes = entry.bytes, "memory cache evicted entry");
                self.release(entry.data);
            }
        }
        true
    }

    /// Drop the entry for `key`.
    pub fn remove(&self, key: &str) -> bool {
        let mut st = self.state.lock();
        match st.entries.remove(key) {
            Some(entry) => {
                st.total_bytes = st.total_bytes.saturating_sub(entry.bytes);
                self.release(entry.data);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut st = self.state.lock();
        st.total_bytes = 0;
        for (_, entry) in st.entries.drain() {
            self.release(entry.data);
        }
    }

    fn release(&self, data: ImageData) {
        if let Ok(image) = Arc::try_unwrap(data.image) {
            image.release_into(&self.pool, "memory cache eviction");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/memory.rs"]
mod tests;
