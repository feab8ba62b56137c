use std::sync::Arc;

use super::*;
use crate::decode::decoder::DecoderRegistry;
use crate::fetch::registry::FetcherRegistry;
use crate::foundation::config::BufferPoolConfig;
use crate::foundation::core::DataFrom;
use crate::foundation::lifecycle::Lifecycle;
use crate::raster::pool::BufferPool;
use crate::request::model::{ImageRequest, ImageRequestBuilder};
use crate::source::sources::ByteArrayDataSource;

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn ctx(build: impl FnOnce(ImageRequestBuilder) -> ImageRequestBuilder) -> DecodeContext {
    DecodeContext::new(
        build(ImageRequest::builder("mem://img")).build(),
        Arc::new(BufferPool::new(BufferPoolConfig::default())),
        FetcherRegistry::new(Vec::new()),
        DecoderRegistry::new(Vec::new()),
    )
}

fn decode(ctx: &DecodeContext, bytes: Vec<u8>) -> LoomResult<DecodeResult> {
    let fetch = FetchResult::new(
        Arc::new(ByteArrayDataSource::new("mem://img", bytes, DataFrom::Memory)),
        None,
    );
    let format = DecoderRegistry::detect_format(&fetch)?;
    StaticDecoderFactory
        .try_create(ctx, &fetch, format)
        .unwrap()
        .decode(ctx)
}

#[test]
fn decodes_png_into_pooled_rgba() {
    let ctx = ctx(|b| b);
    let out = decode(&ctx, png_bytes(16, 8)).unwrap();
    let bitmap = out.bitmap().unwrap();
    assert_eq!(bitmap.size(), Size::new(16, 8));
    assert_eq!(bitmap.format(), PixelFormat::Rgba8);
    assert!(bitmap.is_pooled());
    assert_eq!(bitmap.pixel(3, 3), &[10, 20, 30, 255]);
    assert_eq!(out.info.size(), Size::new(16, 8));
    assert_eq!(out.info.mime_type.as_deref(), Some("image/png"));
    assert_eq!(out.data_from, DataFrom::Memory);
    assert_eq!(out.sample_size, 1);
    assert!(out.transformed.is_empty());
}

#[test]
fn max_size_picks_largest_power_of_two_sample() {
    let ctx = ctx(|b| b.max_size(4, 4));
    let out = decode(&ctx, png_bytes(16, 8)).unwrap();
    assert_eq!(out.sample_size, 2);
    assert_eq!(out.bitmap().unwrap().size(), Size::new(8, 4));
    assert_eq!(out.transformed, vec!["InSampledTransformed(2)"]);
    // Declared size stays the source size.
    assert_eq!(out.info.size(), Size::new(16, 8));
}

#[test]
fn max_bitmap_size_forces_further_sampling() {
    let ctx = ctx(|b| b).with_max_bitmap_size(5);
    let out = decode(&ctx, png_bytes(16, 8)).unwrap();
    assert_eq!(out.sample_size, 4);
    assert_eq!(out.bitmap().unwrap().size(), Size::new(4, 2));
}

#[test]
fn disabled_pool_allocates_plain_raster() {
    let ctx = ctx(|b| b.disable_buffer_pool(true));
    let out = decode(&ctx, png_bytes(4, 4)).unwrap();
    assert!(!out.bitmap().unwrap().is_pooled());
    assert_eq!(ctx.pool().stats().allocated, 0);
}

#[test]
fn garbage_bytes_fail_decode() {
    let ctx = ctx(|b| b);
    let fetch = FetchResult::new(
        Arc::new(ByteArrayDataSource::new(
            "mem://img",
            b"definitely not an image".to_vec(),
            DataFrom::Memory,
        )),
        Some("image/png".to_owned()),
    );
    let err = StaticDecoderFactory
        .try_create(&ctx, &fetch, Some(ImageFormat::Png))
        .unwrap()
        .decode(&ctx)
        .unwrap_err();
    assert!(matches!(err, LoomError::DecodeFailed(_)));
}

#[test]
fn declines_formats_without_codec() {
    let ctx = ctx(|b| b);
    let fetch = FetchResult::new(
        Arc::new(ByteArrayDataSource::new("mem://img", Vec::new(), DataFrom::Memory)),
        None,
    );
    assert!(
        StaticDecoderFactory
            .try_create(&ctx, &fetch, Some(ImageFormat::Heic))
            .is_none()
    );
}

#[test]
fn cancelled_request_stops_before_decoding() {
    let lifecycle = Lifecycle::new();
    lifecycle.cancel();
    let ctx = ctx(|b| b.lifecycle(lifecycle));
    let err = decode(&ctx, png_bytes(4, 4)).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ctx.pool().stats().allocated, 0);
}
