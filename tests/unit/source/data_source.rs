use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::foundation::config::DiskCacheConfig;
use crate::foundation::error::ErrorKind;

/// Counts opens and can fail after a number of bytes.
#[derive(Debug)]
struct CountingSource {
    bytes: Vec<u8>,
    opens: AtomicUsize,
    fail_after: Option<usize>,
}

impl CountingSource {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            opens: AtomicUsize::new(0),
            fail_after: None,
        }
    }
}

struct FailingReader {
    data: std::io::Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Err(std::io::Error::other("connection reset"));
        }
        let cap = buf.len().min(self.remaining);
        let n = self.data.read(&mut buf[..cap])?;
        self.remaining -= n;
        Ok(n)
    }
}

impl DataSource for CountingSource {
    fn uri(&self) -> &str {
        "test://counting"
    }

    fn data_from(&self) -> DataFrom {
        DataFrom::Network
    }

    fn length(&self) -> LoomResult<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn open(&self) -> LoomResult<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        // Slow the copy down so concurrent callers overlap.
        std::thread::sleep(std::time::Duration::from_millis(10));
        let data = std::io::Cursor::new(self.bytes.clone());
        match self.fail_after {
            Some(remaining) => Ok(Box::new(FailingReader { data, remaining })),
            None => Ok(Box::new(data)),
        }
    }
}

fn open_cache(dir: &Path) -> DiskCache {
    DiskCache::open(&DiskCacheConfig {
        dir: dir.to_path_buf(),
        max_bytes: 1 << 20,
    })
    .unwrap()
}

#[test]
fn concurrent_materialize_copies_once() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = Arc::new(open_cache(tmp.path()));
    let source = Arc::new(CountingSource::new(b"image bytes"));

    let threads = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let source = source.clone();
            std::thread::spawn(move || {
                let file = source.file(&cache, &Lifecycle::new()).unwrap();
                file.read_all().unwrap()
            })
        })
        .collect::<Vec<_>>();
    for t in threads {
        assert_eq!(t.join().unwrap(), b"image bytes");
    }

    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    let stats = cache.stats();
    assert_eq!(stats.edits_opened, 1);
    assert_eq!(stats.commits, 1);
}

#[test]
fn first_materialize_keeps_origin_then_reports_disk_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path());
    let source = CountingSource::new(b"abc");

    let first = source.file(&cache, &Lifecycle::new()).unwrap();
    assert_eq!(first.data_from(), DataFrom::Network);
    assert_eq!(first.length().unwrap(), 3);
    assert!(first.local_path().unwrap().starts_with(tmp.path()));

    let second = source.file(&cache, &Lifecycle::new()).unwrap();
    assert_eq!(second.data_from(), DataFrom::DiskCache);
    assert_eq!(second.entry(), first.entry());
    assert_eq!(cache.stats().commits, 1);
}

#[test]
fn failing_stream_leaves_no_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path());
    let mut source = CountingSource::new(&[7u8; 4096]);
    source.fail_after = Some(100);

    let err = source.file(&cache, &Lifecycle::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(cache.get(&source.cache_key()).is_none());
    assert_eq!(cache.stats().aborts, 1);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn cancelled_lifecycle_does_not_open_an_editor() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path());
    let source = CountingSource::new(b"abc");
    let lifecycle = Lifecycle::new();
    lifecycle.cancel();

    let err = source.file(&cache, &lifecycle).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(cache.stats().edits_opened, 0);
    assert_eq!(source.opens.load(Ordering::SeqCst), 0);
}

#[test]
fn disabled_cache_is_unusable() {
    let cache = DiskCache::disabled();
    let source = CountingSource::new(b"abc");
    let err = source.file(&cache, &Lifecycle::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheUnusable);
}

#[test]
fn open_editor_elsewhere_is_unusable() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path());
    let source = CountingSource::new(b"abc");
    let _held = cache.edit(&source.cache_key()).unwrap();

    let err = source.file(&cache, &Lifecycle::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheUnusable);
}

#[test]
fn cache_key_and_header() {
    let source = CountingSource::new(b"\x89PNG\r\n\x1a\nrest");
    assert_eq!(source.cache_key(), "test://counting_data_source");
    assert_eq!(source.header(8).unwrap(), b"\x89PNG\r\n\x1a\n");
    assert_eq!(source.header(1024).unwrap().len(), 12);
}
