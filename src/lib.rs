//! imageloom is an asynchronous image loading pipeline.
//!
//! A request flows through two ordered interceptor chains:
//!
//! 1. **Request chain** (async, caller's task): validation, memory cache, engine.
//! 2. **Decode chain** (blocking, decode worker): result disk cache, transformations, pixel
//!    format, resize, engine.
//!
//! The decode engine resolves a fetcher for the identifier, materializes its bytes into the data
//! disk cache under a per-key lock, resolves a decoder and decodes into rasters drawn from a
//! shared [`BufferPool`]. Every failure surfaces as a tagged [`LoomError`] inside an
//! [`ImageResult`]; cancellation is its own outcome.
//!
//! # Getting started
//!
//! - Build an [`ImageLoader`] from a [`LoaderConfig`].
//! - Describe the load with [`ImageRequest::builder`].
//! - `execute` it on the current task, or `load` it for a cancellable [`LoadHandle`].
#![forbid(unsafe_code)]

/// Disk, memory and keyed-lock primitives.
pub mod cache;
/// Image decoding and the decode interceptor chain.
pub mod decode;
/// Identifier to byte-source resolution.
pub mod fetch;
/// Errors, configuration, shared value types and cancellation.
pub mod foundation;
/// Loader, component registry and decode workers.
pub mod loader;
/// Rasters and the buffer pool.
pub mod raster;
/// Requests, results and the request interceptor chain.
pub mod request;
/// Byte sources and disk materialization.
pub mod source;
/// Post-decode transformations.
pub mod transform;

pub use crate::cache::disk::DiskCache;
pub use crate::cache::memory::MemoryCache;
pub use crate::decode::decoder::{DecodeResult, DecodedImage, Decoder, DecoderFactory};
pub use crate::decode::format::ImageFormat;
pub use crate::decode::interceptor::{DecodeChain, DecodeContext, DecodeInterceptor};
pub use crate::fetch::registry::{FetchResult, Fetcher, FetcherFactory};
pub use crate::foundation::config::{BufferPoolConfig, DiskCacheConfig, LoaderConfig};
pub use crate::foundation::core::{
    CachePolicy, DataFrom, ImageInfo, PixelFormat, Precision, Resize, Size,
};
pub use crate::foundation::error::{ErrorKind, LoomError, LoomResult};
pub use crate::foundation::lifecycle::Lifecycle;
pub use crate::loader::components::ComponentRegistry;
pub use crate::loader::loader::{ImageLoader, ImageLoaderBuilder, LoadHandle};
pub use crate::raster::buffer::Raster;
pub use crate::raster::pool::BufferPool;
pub use crate::request::interceptor::{RequestChain, RequestInterceptor};
pub use crate::request::model::{ImageRequest, ImageRequestBuilder, Target};
pub use crate::request::result::{ImageData, ImageResult};
pub use crate::source::data_source::{DataSource, SharedDataSource};
pub use crate::transform::{
    CircleCropTransformation, RotateTransformation, RoundedCornersTransformation, Transformation,
};
