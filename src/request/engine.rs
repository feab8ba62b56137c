use crate::decode::interceptor::{DecodeChain, DecodeContext};
use crate::foundation::error::LoomResult;
use crate::request::interceptor::{RequestChain, RequestInterceptor};
use crate::request::result::ImageData;

/// Terminal request stage: runs the decode chain on the worker pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineRequestInterceptor;

#[async_trait::async_trait]
impl RequestInterceptor for EngineRequestInterceptor {
    fn name(&self) -> &str {
        "engine"
    }

    async fn intercept(&self, chain: RequestChain) -> LoomResult<ImageData> {
        let request = chain.request().clone();
        let cache_key = chain.context().cache_key();
        let loader = chain.loader().clone();
        let components = loader.components_for(&request);

        let ctx = DecodeContext::new(
            request.clone(),
            loader.pool().clone(),
            components.fetcher_registry(),
            components.decoder_registry(),
        )
        .with_data_cache(loader.data_cache().clone())
        .with_result_cache(loader.result_cache().clone())
        .with_max_bitmap_size(loader.config().max_bitmap_size);
        let stages = components.decode_interceptors().to_vec();
        let pool = loader.pool().clone();

        let result = loader
            .workers()
            .run(
                request.lifecycle(),
                move || DecodeChain::new(&stages, &ctx).proceed(),
                move |orphan| orphan.image.release_into(&pool, "request abandoned"),
            )
            .await?;
        tracing::debug!(
            key = %cache_key,
            from = ?result.data_from,
            transformed = ?result.transformed,
            "decode finished"
        );
        Ok(ImageData::from_decode(result, cache_key))
    }
}
