use super::*;
use crate::decode::decoder::DecodedImage;
use crate::foundation::config::BufferPoolConfig;
use crate::foundation::core::{DataFrom, ImageInfo, PixelFormat};

fn pool() -> Arc<BufferPool> {
    Arc::new(BufferPool::new(BufferPoolConfig::default()))
}

fn data(pool: &BufferPool, side: u32) -> ImageData {
    let raster = pool.acquire(side, side, PixelFormat::L8);
    ImageData {
        image: Arc::new(DecodedImage::Bitmap(raster)),
        info: ImageInfo {
            width: side,
            height: side,
            mime_type: None,
        },
        data_from: DataFrom::Local,
        transformed: Vec::new(),
        cache_key: format!("k{side}"),
    }
}

#[test]
fn get_after_put_shares_the_image() {
    let p = pool();
    let cache = MemoryCache::new(1000, p.clone());
    let d = data(&p, 10);
    assert!(cache.put("a", d.clone()));
    let hit = cache.get("a").unwrap();
    assert!(Arc::ptr_eq(&hit.image, &d.image));
    assert!(cache.get("b").is_none());
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.size(), 100);
}

#[test]
fn oversized_results_are_not_cached() {
    let p = pool();
    let cache = MemoryCache::new(100, p.clone());
    // 81 bytes > 70% of 100.
    assert!(!cache.put("big", data(&p, 9)));
    assert!(cache.is_empty());
    assert!(cache.put("ok", data(&p, 8)));
}

#[test]
fn evicts_lru_and_returns_unshared_bitmaps_to_pool() {
    let p = pool();
    let cache = MemoryCache::new(250, p.clone());
    cache.put("a", data(&p, 10));
    cache.put("b", data(&p, 10));
    assert!(cache.get("a").is_some());
    cache.put("c", data(&p, 10));

    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(p.stats().retained_buffers, 1);
}

#[test]
fn shared_bitmaps_are_not_released_on_eviction() {
    let p = pool();
    let cache = MemoryCache::new(150, p.clone());
    let held = data(&p, 10);
    cache.put("a", held.clone());
    cache.put("b", data(&p, 10));
    assert!(cache.get("a").is_none());
    assert_eq!(p.stats().retained_buffers, 0);
    drop(held);
}

#[test]
fn disabled_cache_stores_nothing() {
    let p = pool();
    let cache = MemoryCache::new(0, p.clone());
    assert!(!cache.is_enabled());
    assert!(!cache.put("a", data(&p, 1)));
}

#[test]
fn remove_and_clear_release() {
    let p = pool();
    let cache = MemoryCache::new(1000, p.clone());
    cache.put("a", data(&p, 4));
    cache.put("b", data(&p, 5));
    assert!(cache.remove("a"));
    assert!(!cache.remove("a"));
    cache.clear();
    assert_eq!(cache.size(), 0);
    assert_eq!(p.stats().retained_buffers, 2);
}
