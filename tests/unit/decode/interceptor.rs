use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;

use super::*;
use crate::decode::static_decoder::StaticDecoderFactory;
use crate::fetch::fetchers::{DataUriFetcherFactory, FileFetcherFactory};
use crate::foundation::config::{BufferPoolConfig, DiskCacheConfig};
use crate::foundation::core::CachePolicy;
use crate::foundation::lifecycle::Lifecycle;
use crate::request::model::ImageRequestBuilder;

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

struct Fixture {
    dir: tempfile::TempDir,
    pool: Arc<BufferPool>,
    data_cache: Arc<DiskCache>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_cache = DiskCache::open(&DiskCacheConfig {
            dir: dir.path().join("data"),
            max_bytes: 1 << 20,
        })
        .unwrap();
        Self {
            dir,
            pool: Arc::new(BufferPool::new(BufferPoolConfig::default())),
            data_cache: Arc::new(data_cache),
        }
    }

    fn write_png(&self, name: &str, w: u32, h: u32) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, png_bytes(w, h)).unwrap();
        file_uri(&path)
    }

    fn run(&self, request: ImageRequest) -> LoomResult<DecodeResult> {
        let ctx = DecodeContext::new(
            request,
            self.pool.clone(),
            FetcherRegistry::new(vec![
                Arc::new(FileFetcherFactory),
                Arc::new(DataUriFetcherFactory),
            ]),
            DecoderRegistry::new(vec![Arc::new(StaticDecoderFactory)]),
        )
        .with_data_cache(self.data_cache.clone());
        let stages: Vec<Arc<dyn DecodeInterceptor>> = vec![Arc::new(EngineDecodeInterceptor)];
        DecodeChain::new(&stages, &ctx).proceed()
    }

    fn run_uri(
        &self,
        uri: &str,
        build: impl FnOnce(ImageRequestBuilder) -> ImageRequestBuilder,
    ) -> LoomResult<DecodeResult> {
        self.run(build(ImageRequest::builder(uri)).build())
    }
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[test]
fn engine_materializes_then_reuses_the_entry() {
    let fx = Fixture::new();
    let uri = fx.write_png("a.png", 5, 4);

    let first = fx.run_uri(&uri, |b| b).unwrap();
    assert_eq!(first.data_from, DataFrom::Local);
    assert_eq!(first.bitmap().unwrap().size().width, 5);
    assert_eq!(fx.data_cache.stats().commits, 1);

    let second = fx.run_uri(&uri, |b| b).unwrap();
    assert_eq!(second.data_from, DataFrom::DiskCache);
    assert_eq!(second.bitmap().unwrap().data(), first.bitmap().unwrap().data());
    assert_eq!(fx.data_cache.stats().edits_opened, 1);
}

#[test]
fn read_only_policy_streams_on_a_miss() {
    let fx = Fixture::new();
    let uri = fx.write_png("ro.png", 2, 2);
    let out = fx
        .run_uri(&uri, |b| b.disk_cache_policy(CachePolicy::ReadOnly))
        .unwrap();
    assert_eq!(out.data_from, DataFrom::Local);
    assert_eq!(fx.data_cache.stats().edits_opened, 0);
    assert_eq!(fx.data_cache.stats().misses, 1);
}

#[test]
fn in_memory_sources_are_not_materialized() {
    let fx = Fixture::new();
    let uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes(3, 3))
    );
    let out = fx.run_uri(&uri, |b| b).unwrap();
    assert_eq!(out.data_from, DataFrom::Memory);
    assert_eq!(fx.data_cache.stats().edits_opened, 0);
}

#[test]
fn missing_source_leaves_no_entry() {
    let fx = Fixture::new();
    let uri = file_uri(&fx.dir.path().join("gone.png"));
    let err = fx.run_uri(&uri, |b| b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(fx.data_cache.size(), 0);
    assert_eq!(fx.data_cache.stats().edits_opened, 0);
}

#[test]
fn unknown_identifier_is_unsupported() {
    let fx = Fixture::new();
    let err = fx.run_uri("gopher://x/y.png", |b| b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedIdentifier);
}

#[test]
fn cancelled_request_never_reaches_a_stage() {
    let fx = Fixture::new();
    let uri = fx.write_png("c.png", 2, 2);
    let lifecycle = Lifecycle::new();
    lifecycle.cancel();
    let err = fx
        .run_uri(&uri, |b| b.lifecycle(lifecycle))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fx.data_cache.stats().edits_opened, 0);
    assert_eq!(fx.pool.stats().allocated, 0);
}

#[test]
fn chain_without_terminal_stage_is_rejected() {
    let fx = Fixture::new();
    let ctx = DecodeContext::new(
        ImageRequest::builder("file:///x.png").build(),
        fx.pool.clone(),
        FetcherRegistry::default(),
        DecoderRegistry::default(),
    );
    let err = DecodeChain::new(&[], &ctx).proceed().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ctx.max_bitmap_size(), 16_384);
}
