use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::decode::decoder::DecoderRegistry;
use crate::fetch::registry::FetcherRegistry;
use crate::foundation::config::{BufferPoolConfig, DiskCacheConfig};
use crate::foundation::core::{CachePolicy, Precision, Resize};
use crate::raster::pool::BufferPool;
use crate::request::model::{ImageRequest, ImageRequestBuilder};

#[derive(Debug, Default)]
struct Counting {
    calls: AtomicUsize,
}

impl DecodeInterceptor for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut raster = chain.context().pool().acquire(3, 2, PixelFormat::Rgba8);
        for (i, b) in raster.data_mut().iter_mut().enumerate() {
            *b = i as u8;
        }
        Ok(DecodeResult {
            image: DecodedImage::Bitmap(raster),
            info: ImageInfo {
                width: 30,
                height: 20,
                mime_type: Some("image/png".to_owned()),
            },
            data_from: DataFrom::Local,
            transformed: vec!["InSampledTransformed(8)".to_owned()],
            sample_size: 8,
        })
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    cache: Arc<DiskCache>,
    pool: Arc<BufferPool>,
    terminal: Arc<Counting>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(&DiskCacheConfig {
            dir: dir.path().to_path_buf(),
            max_bytes: 1 << 20,
        })
        .unwrap();
        Self {
            _dir: dir,
            cache: Arc::new(cache),
            pool: Arc::new(BufferPool::new(BufferPoolConfig::default())),
            terminal: Arc::new(Counting::default()),
        }
    }

    fn run(
        &self,
        build: impl FnOnce(ImageRequestBuilder) -> ImageRequestBuilder,
    ) -> LoomResult<DecodeResult> {
        let request = build(ImageRequest::builder("file:///img.png")).build();
        let ctx = DecodeContext::new(
            request,
            self.pool.clone(),
            FetcherRegistry::new(Vec::new()),
            DecoderRegistry::new(Vec::new()),
        )
        .with_result_cache(self.cache.clone());
        let stages: Vec<Arc<dyn DecodeInterceptor>> =
            vec![Arc::new(ResultCacheDecodeInterceptor), self.terminal.clone()];
        DecodeChain::new(&stages, &ctx).proceed()
    }

    fn calls(&self) -> usize {
        self.terminal.calls.load(Ordering::SeqCst)
    }
}

fn resized(b: ImageRequestBuilder) -> ImageRequestBuilder {
    b.resize(Resize::new(3, 2, Precision::Exactly).unwrap())
}

#[test]
fn second_run_is_served_from_disk() {
    let fx = Fixture::new();
    let first = fx.run(resized).unwrap();
    assert_eq!(first.data_from, DataFrom::Local);
    assert_eq!(fx.cache.stats().commits, 2);

    let second = fx.run(resized).unwrap();
    assert_eq!(fx.calls(), 1);
    assert_eq!(second.data_from, DataFrom::ResultCache);
    assert_eq!(second.transformed, first.transformed);
    assert_eq!(second.info, first.info);
    assert_eq!(second.sample_size, 8);
    let (a, b) = (first.bitmap().unwrap(), second.bitmap().unwrap());
    assert_eq!(a.size(), b.size());
    assert_eq!(a.format(), b.format());
    assert_eq!(a.data(), b.data());
    assert!(b.is_pooled());
}

#[test]
fn untouched_source_skips_the_tier() {
    let fx = Fixture::new();
    fx.run(|b| b).unwrap();
    fx.run(|b| b).unwrap();
    assert_eq!(fx.calls(), 2);
    assert_eq!(fx.cache.stats().edits_opened, 0);
}

#[test]
fn read_only_policy_never_writes() {
    let fx = Fixture::new();
    fx.run(|b| resized(b).result_cache_policy(CachePolicy::ReadOnly))
        .unwrap();
    fx.run(|b| resized(b).result_cache_policy(CachePolicy::ReadOnly))
        .unwrap();
    assert_eq!(fx.calls(), 2);
    assert_eq!(fx.cache.stats().commits, 0);
}

#[test]
fn corrupt_entry_is_replaced() {
    let fx = Fixture::new();
    let key = ImageRequest::builder("file:///img.png")
        .resize(Resize::new(3, 2, Precision::Exactly).unwrap())
        .build()
        .cache_key();
    ResultCacheDecodeInterceptor::write_entry(&fx.cache, &pixels_key(&key), b"short").unwrap();
    ResultCacheDecodeInterceptor::write_entry(&fx.cache, &meta_key(&key), b"{not json").unwrap();

    let out = fx.run(resized).unwrap();
    assert_eq!(fx.calls(), 1);
    assert_eq!(out.data_from, DataFrom::Local);

    let again = fx.run(resized).unwrap();
    assert_eq!(fx.calls(), 1);
    assert_eq!(again.data_from, DataFrom::ResultCache);
}

#[test]
fn size_mismatch_counts_as_corrupt() {
    let fx = Fixture::new();
    fx.run(resized).unwrap();
    let key = ImageRequest::builder("file:///img.png")
        .resize(Resize::new(3, 2, Precision::Exactly).unwrap())
        .build()
        .cache_key();
    ResultCacheDecodeInterceptor::write_entry(&fx.cache, &pixels_key(&key), b"tiny").unwrap();

    let out = fx.run(resized).unwrap();
    assert_eq!(out.data_from, DataFrom::Local);
    assert_eq!(fx.calls(), 2);
}
