use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

use crate::cache::keyed_lock::{KeyedGuard, KeyedLocks};
use crate::foundation::config::DiskCacheConfig;
use crate::foundation::digest::{is_sha256_hex, sha256_hex};
use crate::foundation::error::{LoomError, LoomResult};

const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Counters describing disk cache traffic since open.
pub struct DiskCacheStats {
    /// Editors handed out by [`DiskCache::edit`].
    pub edits_opened: u64,
    /// Successful commits.
    pub commits: u64,
    /// Aborted edits, explicit or by drop.
    pub aborts: u64,
    /// `get` calls that found a committed entry.
    pub hits: u64,
    /// `get` calls that found nothing.
    pub misses: u64,
    /// Entries removed to honour the size budget.
    pub evictions: u64,
}

#[derive(Debug, Clone, Copy)]
struct EntryMeta {
    size: u64,
    last_access: u64,
}

#[derive(Debug, Default)]
struct DiskState {
    entries: HashMap<String, EntryMeta>,
    open_edits: HashSet<String>,
    total_bytes: u64,
    clock: u64,
    stats: DiskCacheStats,
}

impl DiskState {
    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }
}

/// Committed cache entry. Cheap to clone; the file may be evicted after the snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCacheEntry {
    digest: String,
    path: PathBuf,
    size: u64,
}

impl DiskCacheEntry {
    /// Encoded key (hex SHA-256 of the logical key).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the backing file for reading.
    pub fn open(&self) -> LoomResult<File> {
        File::open(&self.path).map_err(|e| {
            LoomError::source_unavailable(format!(
                "open disk cache entry '{}': {e}",
                self.path.display()
            ))
        })
    }

    /// Read the whole entry.
    pub fn read_all(&self) -> LoomResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size as usize);
        self.open()?
            .read_to_end(&mut out)
            .with_context(|| format!("read disk cache entry '{}'", self.path.display()))?;
        Ok(out)
    }
}

/// Transactional, size-bounded byte cache on the filesystem.
///
/// Logical keys are encoded with SHA-256; each committed entry is one file named by the digest.
/// Writes go to `<digest>.tmp` and are renamed into place on commit, so readers never see a
/// partial entry. At most one [`Editor`] may be open per key.
pub struct DiskCache {
    dir: Option<PathBuf>,
    max_bytes: u64,
    state: Mutex<DiskState>,
    edit_locks: KeyedLocks,
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("dir", &self.dir)
            .field("max_bytes", &self.max_bytes)
            .field("size", &self.size())
            .finish()
    }
}

impl DiskCache {
    /// Open (creating if needed) a cache directory and index its committed entries.
    ///
    /// Leftover `.tmp` files from interrupted edits are deleted.
    pub fn open(cfg: &DiskCacheConfig) -> LoomResult<Self> {
        if cfg.max_bytes == 0 {
            return Err(LoomError::validation("disk cache max_bytes must be > 0"));
        }
        std::fs::create_dir_all(&cfg.dir)
            .with_context(|| format!("create disk cache dir '{}'", cfg.dir.display()))?;

        let mut found = Vec::<(String, u64, std::time::SystemTime)>::new();
        let listing = std::fs::read_dir(&cfg.dir)
            .with_context(|| format!("list disk cache dir '{}'", cfg.dir.display()))?;
        for item in listing {
            let item = item.context("read disk cache dir entry")?;
            let name = item.file_name().to_string_lossy().into_owned();
            if name.ends_with(TMP_SUFFIX) {
                let _ = std::fs::remove_file(item.path());
                continue;
            }
            if !is_sha256_hex(&name) {
                continue;
            }
            let meta = item.metadata().context("stat disk cache entry")?;
            if !meta.is_file() {
                continue;
            }
            let mtime = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            found.push((name, meta.len(), mtime));
        }
        found.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));

        let mut state = DiskState::default();
        for (name, size, _) in found {
            let last_access = state.tick();
            state.total_bytes = state.total_bytes.saturating_add(size);
            state.entries.insert(name, EntryMeta { size, last_access });
        }
        tracing::debug!(
            dir = %cfg.dir.display(),
            entries = state.entries.len(),
            bytes = state.total_bytes,
            "disk cache opened"
        );

        let cache = Self {
            dir: Some(cfg.dir.clone()),
            max_bytes: cfg.max_bytes,
            state: Mutex::new(state),
            edit_locks: KeyedLocks::new(),
        };
        cache.trim_to_size(&mut cache.state.lock());
        Ok(cache)
    }

    /// A cache that never stores: `get` misses and `edit` returns `None`.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            max_bytes: 0,
            state: Mutex::new(DiskState::default()),
            edit_locks: KeyedLocks::new(),
        }
    }

    /// Whether entries can be stored.
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Backing directory, when enabled.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// One-way encoding of a logical key into an entry name.
    pub fn encode_key(key: &str) -> String {
        sha256_hex(key.as_bytes())
    }

    pub fn max_size(&self) -> u64 {
        self.max_bytes
    }

    /// Summed size of committed entries.
    pub fn size(&self) -> u64 {
        self.state.lock().total_bytes
    }

    pub fn stats(&self) -> DiskCacheStats {
        self.state.lock().stats.clone()
    }

    fn entry_path(&self, digest: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(digest))
    }

    /// Committed entry for `key`, if any. Marks it most recently used.
    pub fn get(&self, key: &str) -> Option<DiskCacheEntry> {
        let digest = Self::encode_key(key);
        let path = self.entry_path(&digest)?;
        let mut st = self.state.lock();
        let Some(meta) = st.entries.get(&digest).copied() else {
            st.stats.misses = st.stats.misses.saturating_add(1);
            return None;
        };
        if !path.is_file() {
            // Removed behind our back.
            st.entries.remove(&digest);
            st.total_bytes = st.total_bytes.saturating_sub(meta.size);
            st.stats.misses = st.stats.misses.saturating_add(1);
            return None;
        }
        let last_access = st.tick();
        if let Some(m) = st.entries.get_mut(&digest) {
            m.last_access = last_access;
        }
        st.stats.hits = st.stats.hits.saturating_add(1);
        Some(DiskCacheEntry {
            digest,
            path,
            size: meta.size,
        })
    }

    /// Open an edit transaction for `key`.
    ///
    /// Returns `None` when the cache is disabled or another edit for the key is open.
    pub fn edit(&self, key: &str) -> Option<Editor<'_>> {
        let digest = Self::encode_key(key);
        let path = self.entry_path(&digest)?;
        let mut st = self.state.lock();
        if !st.open_edits.insert(digest.clone()) {
            return None;
        }
        st.stats.edits_opened = st.stats.edits_opened.saturating_add(1);
        let tmp = path.with_file_name(format!("{digest}{TMP_SUFFIX}"));
        Some(Editor {
            cache: self,
            digest,
            path,
            tmp,
            done: false,
        })
    }

    /// Delete the entry for `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        let digest = Self::encode_key(key);
        let Some(path) = self.entry_path(&digest) else {
            return false;
        };
        let mut st = self.state.lock();
        match st.entries.remove(&digest) {
            Some(meta) => {
                st.total_bytes = st.total_bytes.saturating_sub(meta.size);
                let _ = std::fs::remove_file(path);
                true
            }
            None => false,
        }
    }

    /// Delete every committed entry.
    pub fn clear(&self) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        let mut st = self.state.lock();
        for digest in st.entries.keys() {
            let _ = std::fs::remove_file(dir.join(digest));
        }
        st.entries.clear();
        st.total_bytes = 0;
    }

    /// Per-key lock serialising get-or-create sequences, for worker threads.
    pub fn edit_lock_blocking(&self, key: &str) -> KeyedGuard {
        self.edit_locks.lock_blocking(key)
    }

    /// Per-key lock serialising get-or-create sequences, for async callers.
    pub async fn edit_lock(&self, key: &str) -> KeyedGuard {
        self.edit_locks.lock(key).await
    }

    /// Run `f` while holding the per-key edit lock.
    pub fn with_edit_lock<R>(&self, key: &str, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.edit_lock_blocking(key);
        f(self)
    }

    fn finish_commit(&self, digest: &str, size: u64) {
        let mut st = self.state.lock();
        st.open_edits.remove(digest);
        let last_access = st.tick();
        if let Some(old) = st
            .entries
            .insert(digest.to_string(), EntryMeta { size, last_access })
        {
            st.total_bytes = st.total_bytes.saturating_sub(old.size);
        }
        st.total_bytes = st.total_bytes.saturating_add(size);
        st.stats.commits = st.stats.commits.saturating_add(1);
        self.trim_to_size(&mut st);
    }

    fn finish_abort(&self, digest: &str, tmp: &Path) {
        let _ = std::fs::remove_file(tmp);
        let mut st = self.state.lock();
        st.open_edits.remove(digest);
        st.stats.aborts = st.stats.aborts.saturating_add(1);
    }

    fn trim_to_size(&self, st: &mut DiskState) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        while st.total_bytes > self.max_bytes {
            let victim = st
                .entries
                .iter()
                .filter(|(digest, _)| !st.open_edits.contains(*digest))
                .min_by_key(|(_, meta)| meta.last_access)
                .map(|(digest, meta)| (digest.clone(), meta.size));
            let Some((digest, size)) = victim else {
                break;
            };
            st.entries.remove(&digest);
            st.total_bytes = st.total_bytes.saturating_sub(size);
            st.stats.evictions = st.stats.evictions.saturating_add(1);
            let _ = std::fs::remove_file(dir.join(&digest));
            tracing::debug!(digest = %digest, size, "disk cache evicted entry");
        }
    }
}

/// Open edit transaction. Dropping without [`commit`](Self::commit) aborts.
pub struct Editor<'a> {
    cache: &'a DiskCache,
    digest: String,
    path: PathBuf,
    tmp: PathBuf,
    done: bool,
}

impl Editor<'_> {
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Fresh (truncated) stream for the entry's bytes.
    pub fn new_output_stream(&mut self) -> LoomResult<File> {
        File::create(&self.tmp).map_err(|e| {
            LoomError::cache_unusable(format!(
                "create disk cache temp file '{}': {e}",
                self.tmp.display()
            ))
        })
    }

    /// Publish the written bytes atomically.
    pub fn commit(mut self) -> LoomResult<DiskCacheEntry> {
        self.done = true;
        let size = match std::fs::metadata(&self.tmp) {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.cache.finish_abort(&self.digest, &self.tmp);
                return Err(LoomError::cache_unusable(format!(
                    "commit without written data '{}': {e}",
                    self.tmp.display()
                )));
            }
        };
        if let Err(e) = std::fs::rename(&self.tmp, &self.path) {
            self.cache.finish_abort(&self.digest, &self.tmp);
            return Err(LoomError::cache_unusable(format!(
                "publish disk cache entry '{}': {e}",
                self.path.display()
            )));
        }
        self.cache.finish_commit(&self.digest, size);
        Ok(DiskCacheEntry {
            digest: self.digest.clone(),
            path: self.path.clone(),
            size,
        })
    }

    /// Discard the written bytes. Any previously committed entry stays untouched.
    pub fn abort(mut self) {
        self.done = true;
        self.cache.finish_abort(&self.digest, &self.tmp);
    }
}

impl Drop for Editor<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.cache.finish_abort(&self.digest, &self.tmp);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/disk.rs"]
mod tests;
