use std::sync::Arc;

use crate::cache::disk::DiskCache;
use crate::decode::decoder::{DecodeResult, DecoderRegistry};
use crate::fetch::registry::{FetchResult, FetcherRegistry};
use crate::foundation::core::DataFrom;
use crate::foundation::error::{ErrorKind, LoomError, LoomResult};
use crate::raster::pool::BufferPool;
use crate::request::model::ImageRequest;
use crate::source::data_source::DiskCacheDataSource;

/// Shared state for one run of the decode chain.
pub struct DecodeContext {
    request: ImageRequest,
    pool: Arc<BufferPool>,
    data_cache: Arc<DiskCache>,
    result_cache: Arc<DiskCache>,
    fetchers: FetcherRegistry,
    decoders: DecoderRegistry,
    max_bitmap_size: u32,
}

impl std::fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("request", &self.request)
            .field("fetchers", &self.fetchers)
            .field("decoders", &self.decoders)
            .finish_non_exhaustive()
    }
}

impl DecodeContext {
    /// Context with both disk caches disabled.
    pub fn new(
        request: ImageRequest,
        pool: Arc<BufferPool>,
        fetchers: FetcherRegistry,
        decoders: DecoderRegistry,
    ) -> Self {
        Self {
            request,
            pool,
            data_cache: Arc::new(DiskCache::disabled()),
            result_cache: Arc::new(DiskCache::disabled()),
            fetchers,
            decoders,
            max_bitmap_size: 16_384,
        }
    }

    /// Use `cache` for source bytes.
    pub fn with_data_cache(mut self, cache: Arc<DiskCache>) -> Self {
        self.data_cache = cache;
        self
    }

    /// Use `cache` for decoded results.
    pub fn with_result_cache(mut self, cache: Arc<DiskCache>) -> Self {
        self.result_cache = cache;
        self
    }

    /// Bound decoded dimensions.
    pub fn with_max_bitmap_size(mut self, max: u32) -> Self {
        self.max_bitmap_size = max.max(1);
        self
    }

    /// Request being decoded.
    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn data_cache(&self) -> &DiskCache {
        &self.data_cache
    }

    pub fn result_cache(&self) -> &DiskCache {
        &self.result_cache
    }

    /// Largest decoded dimension.
    pub fn max_bitmap_size(&self) -> u32 {
        self.max_bitmap_size
    }

    pub fn fetchers(&self) -> &FetcherRegistry {
        &self.fetchers
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }
}

/// Post-decode stage. Runs on a worker thread.
///
/// A stage either returns without calling [`DecodeChain::proceed`] (short-circuit) or calls it
/// once and post-processes the result.
pub trait DecodeInterceptor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Handle one decode.
    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult>;
}

/// Position in the decode stage list. The chain, not the stages, advances the index.
pub struct DecodeChain<'a> {
    stages: &'a [Arc<dyn DecodeInterceptor>],
    index: usize,
    ctx: &'a DecodeContext,
}

impl<'a> DecodeChain<'a> {
    /// Chain positioned before the first stage.
    pub fn new(stages: &'a [Arc<dyn DecodeInterceptor>], ctx: &'a DecodeContext) -> Self {
        Self {
            stages,
            index: 0,
            ctx,
        }
    }

    pub fn context(&self) -> &'a DecodeContext {
        self.ctx
    }

    /// Request being decoded.
    pub fn request(&self) -> &'a ImageRequest {
        &self.ctx.request
    }

    /// Index of the next stage to run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Run the next stage.
    pub fn proceed(self) -> LoomResult<DecodeResult> {
        self.ctx.request.lifecycle().check()?;
        let stage = self.stages.get(self.index).ok_or_else(|| {
            LoomError::validation("decode chain ran past its terminal interceptor")
        })?;
        tracing::trace!(stage = stage.name(), index = self.index, "decode chain");
        stage.intercept(DecodeChain {
            stages: self.stages,
            index: self.index + 1,
            ctx: self.ctx,
        })
    }
}

/// Terminal stage: fetch, materialize into the data cache, resolve a decoder, decode.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineDecodeInterceptor;

impl EngineDecodeInterceptor {
    fn materialize(ctx: &DecodeContext, fetched: FetchResult) -> LoomResult<FetchResult> {
        let policy = ctx.request.disk_cache_policy();
        let source = &fetched.data_source;
        if !ctx.data_cache.is_enabled() || !policy.read_or_write() || !source.should_materialize() {
            return Ok(fetched);
        }

        let materialized = if policy.write_enabled() {
            source.file(&ctx.data_cache, ctx.request.lifecycle())
        } else {
            match ctx.data_cache.get(&source.cache_key()) {
                Some(entry) => Ok(DiskCacheDataSource::new(
                    source.uri(),
                    entry,
                    DataFrom::DiskCache,
                )),
                None => return Ok(fetched),
            }
        };
        match materialized {
            Ok(file) => Ok(FetchResult::new(Arc::new(file), fetched.mime_type)),
            Err(e) if e.kind() == ErrorKind::CacheUnusable => {
                tracing::warn!(uri = source.uri(), error = %e, "data disk cache unusable, streaming directly");
                Ok(fetched)
            }
            Err(e) => Err(e),
        }
    }
}

impl DecodeInterceptor for EngineDecodeInterceptor {
    fn name(&self) -> &str {
        "engine"
    }

    #[tracing::instrument(level = "debug", skip_all, fields(uri = chain.request().uri()))]
    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        let ctx = chain.context();
        let lifecycle = ctx.request.lifecycle();

        let fetched = ctx.fetchers.resolve(&ctx.request)?;
        lifecycle.check()?;
        let fetched = Self::materialize(ctx, fetched)?;
        lifecycle.check()?;

        let decoder = ctx.decoders.resolve(ctx, &fetched)?;
        let result = decoder.decode(ctx)?;
        if lifecycle.is_cancelled() {
            result.image.release_into(&ctx.pool, "cancelled after decode");
            return Err(LoomError::Cancelled);
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/interceptor.rs"]
mod tests;
