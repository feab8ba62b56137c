use std::io::Write;

use super::*;

fn cfg(dir: &Path, max_bytes: u64) -> DiskCacheConfig {
    DiskCacheConfig {
        dir: dir.to_path_buf(),
        max_bytes,
    }
}

fn put(cache: &DiskCache, key: &str, bytes: &[u8]) -> DiskCacheEntry {
    let mut ed = cache.edit(key).unwrap();
    let mut out = ed.new_output_stream().unwrap();
    out.write_all(bytes).unwrap();
    drop(out);
    ed.commit().unwrap()
}

#[test]
fn commit_publishes_entry_under_digest_name() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    assert!(cache.get("k").is_none());

    let entry = put(&cache, "k", b"hello");
    assert_eq!(entry.size(), 5);
    assert_eq!(entry.digest(), DiskCache::encode_key("k"));
    assert_eq!(entry.path(), tmp.path().join(DiskCache::encode_key("k")));

    let got = cache.get("k").unwrap();
    assert_eq!(got.read_all().unwrap(), b"hello");
    assert_eq!(cache.size(), 5);

    let stats = cache.stats();
    assert_eq!(stats.edits_opened, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn abort_leaves_no_entry_and_no_temp_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();

    let mut ed = cache.edit("k").unwrap();
    ed.new_output_stream().unwrap().write_all(b"partial").unwrap();
    ed.abort();

    assert!(cache.get("k").is_none());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    assert_eq!(cache.stats().aborts, 1);
}

#[test]
fn dropped_editor_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    {
        let mut ed = cache.edit("k").unwrap();
        ed.new_output_stream().unwrap().write_all(b"x").unwrap();
    }
    assert!(cache.get("k").is_none());
    assert!(cache.edit("k").is_some());
}

#[test]
fn abort_keeps_previous_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    put(&cache, "k", b"first");

    let mut ed = cache.edit("k").unwrap();
    ed.new_output_stream().unwrap().write_all(b"second-partial").unwrap();
    ed.abort();

    assert_eq!(cache.get("k").unwrap().read_all().unwrap(), b"first");
}

#[test]
fn only_one_editor_per_key() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    let first = cache.edit("k").unwrap();
    assert!(cache.edit("k").is_none());
    assert!(cache.edit("other").is_some());
    first.abort();
    assert!(cache.edit("k").is_some());
}

#[test]
fn commit_without_stream_is_cache_unusable() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    let ed = cache.edit("k").unwrap();
    let err = ed.commit().unwrap_err();
    assert_eq!(err.kind(), crate::foundation::error::ErrorKind::CacheUnusable);
    assert!(cache.get("k").is_none());
    assert!(cache.edit("k").is_some());
}

#[test]
fn evicts_least_recently_accessed_to_fit_budget() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 10)).unwrap();
    put(&cache, "a", b"aaaa");
    put(&cache, "b", b"bbbb");
    // Touch `a` so `b` becomes the oldest.
    assert!(cache.get("a").is_some());
    put(&cache, "c", b"cccc");

    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.size(), 8);
    assert_eq!(cache.stats().evictions, 1);
    assert!(!tmp.path().join(DiskCache::encode_key("b")).exists());
}

#[test]
fn reopen_reindexes_and_drops_stale_temp_files() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
        put(&cache, "k", b"persisted");
    }
    let stale = tmp.path().join(format!("{}.tmp", DiskCache::encode_key("z")));
    std::fs::write(&stale, b"junk").unwrap();
    std::fs::write(tmp.path().join("README"), b"not an entry").unwrap();

    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    assert!(!stale.exists());
    assert_eq!(cache.size(), 9);
    assert_eq!(cache.get("k").unwrap().read_all().unwrap(), b"persisted");
}

#[test]
fn remove_and_clear() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    put(&cache, "a", b"1");
    put(&cache, "b", b"22");
    assert!(cache.remove("a"));
    assert!(!cache.remove("a"));
    assert_eq!(cache.size(), 2);
    cache.clear();
    assert_eq!(cache.size(), 0);
    assert!(cache.get("b").is_none());
}

#[test]
fn externally_deleted_entry_is_a_miss() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap();
    let entry = put(&cache, "k", b"abc");
    std::fs::remove_file(entry.path()).unwrap();
    assert!(cache.get("k").is_none());
    assert_eq!(cache.size(), 0);
}

#[test]
fn disabled_cache_never_stores() {
    let cache = DiskCache::disabled();
    assert!(!cache.is_enabled());
    assert!(cache.edit("k").is_none());
    assert!(cache.get("k").is_none());
    assert_eq!(cache.size(), 0);
}

#[test]
fn zero_budget_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let err = DiskCache::open(&cfg(tmp.path(), 0)).unwrap_err();
    assert!(err.to_string().contains("max_bytes"));
}

#[test]
fn with_edit_lock_serializes_get_or_create() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = std::sync::Arc::new(DiskCache::open(&cfg(tmp.path(), 1 << 20)).unwrap());

    let threads = (0..8)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                cache.with_edit_lock("k", |c| {
                    if c.get("k").is_none() {
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        put(c, "k", b"once");
                    }
                })
            })
        })
        .collect::<Vec<_>>();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(cache.stats().commits, 1);
    assert_eq!(cache.get("k").unwrap().read_all().unwrap(), b"once");
}
