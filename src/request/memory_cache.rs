use crate::foundation::core::DataFrom;
use crate::foundation::error::LoomResult;
use crate::request::interceptor::{RequestChain, RequestInterceptor};
use crate::request::result::ImageData;

/// Serves results from the memory cache and stores fresh ones.
///
/// Lookup and store run under the cache key's lock, so identical concurrent requests compute
/// once and the rest hit.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCacheRequestInterceptor;

#[async_trait::async_trait]
impl RequestInterceptor for MemoryCacheRequestInterceptor {
    fn name(&self) -> &str {
        "memory_cache"
    }

    async fn intercept(&self, chain: RequestChain) -> LoomResult<ImageData> {
        let request = chain.request().clone();
        let policy = request.memory_cache_policy();
        let loader = chain.loader().clone();
        let cache = loader.memory_cache();
        if !cache.is_enabled() || !policy.read_or_write() {
            return chain.proceed(request).await;
        }

        let key = chain.context().cache_key();
        let _guard = cache.lock(&key).await;
        if policy.read_enabled()
            && let Some(hit) = cache.get(&key)
        {
            tracing::debug!(key = %key, "memory cache hit");
            return Ok(hit.with_data_from(DataFrom::MemoryCache));
        }

        let data = chain.proceed(request).await?;
        if policy.write_enabled() && !data.image.is_animated() {
            cache.put(&key, data.clone());
        }
        Ok(data)
    }
}
