use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::cache::disk::{DiskCache, DiskCacheEntry};
use crate::foundation::core::DataFrom;
use crate::foundation::error::{LoomError, LoomResult};
use crate::foundation::lifecycle::Lifecycle;

const COPY_CHUNK: usize = 64 * 1024;

/// Where the bytes of one image come from.
///
/// Every call to [`open`](Self::open) yields a fresh, independent stream. A source never owns
/// cached bytes itself; [`file`](Self::file) persists them through a [`DiskCache`].
pub trait DataSource: Send + Sync + std::fmt::Debug {
    /// Identifier this source was resolved from.
    fn uri(&self) -> &str;

    /// Origin tier of the bytes.
    fn data_from(&self) -> DataFrom;

    /// Total byte length.
    fn length(&self) -> LoomResult<u64>;

    /// Fresh readable stream over the bytes.
    fn open(&self) -> LoomResult<Box<dyn Read + Send>>;

    /// Logical key of the materialized bytes in the data disk cache.
    fn cache_key(&self) -> String {
        format!("{}_data_source", self.uri())
    }

    /// Local file already backing the bytes, if any.
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Whether [`file`](Self::file) is worth doing for this source.
    fn should_materialize(&self) -> bool {
        true
    }

    /// Materialize the bytes into `cache` (or reuse a committed entry) and return a source over
    /// the cached file.
    fn file(&self, cache: &DiskCache, lifecycle: &Lifecycle) -> LoomResult<DiskCacheDataSource> {
        materialize(self, cache, lifecycle)
    }

    /// Read the whole stream.
    fn read_all(&self) -> LoomResult<Vec<u8>> {
        let mut out = Vec::new();
        self.open()?
            .read_to_end(&mut out)
            .map_err(|e| LoomError::source_unavailable(format!("read '{}': {e}", self.uri())))?;
        Ok(out)
    }

    /// Up to `len` leading bytes, for format sniffing.
    fn header(&self, len: usize) -> LoomResult<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        self.open()?
            .take(len as u64)
            .read_to_end(&mut out)
            .map_err(|e| LoomError::source_unavailable(format!("read '{}': {e}", self.uri())))?;
        Ok(out)
    }
}

/// Get-or-create the disk cache entry for `source`.
///
/// Holds the per-key edit lock for the whole sequence, so concurrent callers for the same key
/// wait and then reuse the committed entry. Any failure mid-copy aborts the editor.
pub fn materialize<S>(
    source: &S,
    cache: &DiskCache,
    lifecycle: &Lifecycle,
) -> LoomResult<DiskCacheDataSource>
where
    S: DataSource + ?Sized,
{
    lifecycle.check()?;
    let key = source.cache_key();
    let _guard = cache.edit_lock_blocking(&key);

    if let Some(entry) = cache.get(&key) {
        tracing::debug!(key = %key, "data disk cache hit");
        return Ok(DiskCacheDataSource::new(source.uri(), entry, DataFrom::DiskCache));
    }
    lifecycle.check()?;

    let mut editor = cache
        .edit(&key)
        .ok_or_else(|| LoomError::cache_unusable(format!("no editor for '{key}'")))?;
    let mut input = match source.open() {
        Ok(input) => input,
        Err(e) => {
            editor.abort();
            return Err(e);
        }
    };
    let copied = editor
        .new_output_stream()
        .and_then(|mut out| copy_with_checks(source.uri(), &mut input, &mut out, lifecycle));
    if let Err(e) = copied {
        editor.abort();
        return Err(e);
    }
    editor.commit()?;

    // The budget may have evicted the entry right away.
    let entry = cache.get(&key).ok_or_else(|| {
        LoomError::cache_unusable(format!("entry '{key}' not readable after commit"))
    })?;
    tracing::debug!(key = %key, size = entry.size(), "data disk cache committed");
    Ok(DiskCacheDataSource::new(source.uri(), entry, source.data_from()))
}

fn copy_with_checks(
    uri: &str,
    input: &mut dyn Read,
    out: &mut std::fs::File,
    lifecycle: &Lifecycle,
) -> LoomResult<()> {
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        lifecycle.check()?;
        let n = input
            .read(&mut buf)
            .map_err(|e| LoomError::source_unavailable(format!("read '{uri}': {e}")))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .map_err(|e| LoomError::cache_unusable(format!("write cache entry: {e}")))?;
    }
    out.flush()
        .map_err(|e| LoomError::cache_unusable(format!("flush cache entry: {e}")))
}

/// Bytes served from a committed data disk cache entry.
#[derive(Debug, Clone)]
pub struct DiskCacheDataSource {
    uri: String,
    entry: DiskCacheEntry,
    from: DataFrom,
}

impl DiskCacheDataSource {
    /// Wrap a committed entry. `from` is [`DataFrom::DiskCache`] for reuse, or the origin tier
    /// when the entry was just written.
    pub fn new(uri: impl Into<String>, entry: DiskCacheEntry, from: DataFrom) -> Self {
        Self {
            uri: uri.into(),
            entry,
            from,
        }
    }

    pub fn entry(&self) -> &DiskCacheEntry {
        &self.entry
    }
}

impl DataSource for DiskCacheDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn data_from(&self) -> DataFrom {
        self.from
    }

    fn length(&self) -> LoomResult<u64> {
        Ok(self.entry.size())
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        Ok(Box::new(self.entry.open()?))
    }

    fn local_path(&self) -> Option<&Path> {
        Some(self.entry.path())
    }

    fn should_materialize(&self) -> bool {
        false
    }

    fn file(&self, _cache: &DiskCache, _lifecycle: &Lifecycle) -> LoomResult<DiskCacheDataSource> {
        Ok(self.clone())
    }
}

/// Shared handle to any source.
pub type SharedDataSource = Arc<dyn DataSource>;

#[cfg(test)]
#[path = "../../tests/unit/source/data_source.rs"]
mod tests;
