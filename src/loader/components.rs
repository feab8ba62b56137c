use std::sync::Arc;

use crate::decode::decoder::{DecoderFactory, DecoderRegistry};
use crate::decode::gif::GifDecoderFactory;
use crate::decode::interceptor::{DecodeInterceptor, EngineDecodeInterceptor};
use crate::decode::pixel_format::PixelFormatDecodeInterceptor;
use crate::decode::resize::ResizeDecodeInterceptor;
use crate::decode::result_cache::ResultCacheDecodeInterceptor;
use crate::decode::static_decoder::StaticDecoderFactory;
use crate::fetch::fetchers::{
    AssetFetcherFactory, ContentFetcherFactory, DataUriFetcherFactory, FileFetcherFactory,
    ResourceFetcherFactory,
};
use crate::fetch::registry::{FetcherFactory, FetcherRegistry};
use crate::foundation::config::LoaderConfig;
use crate::request::engine::EngineRequestInterceptor;
use crate::request::interceptor::RequestInterceptor;
use crate::request::memory_cache::MemoryCacheRequestInterceptor;
use crate::request::validate::ValidateRequestInterceptor;
use crate::source::sources::{ContentResolver, ResourceBundle};
use crate::transform::interceptor::TransformationDecodeInterceptor;

/// Ordered lists of pluggable pipeline parts.
///
/// A loader owns one registry; a request may carry another whose entries run first. Order
/// matters everywhere: the first fetcher or decoder factory that accepts wins, and interceptors
/// run in list order.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    fetchers: Vec<Arc<dyn FetcherFactory>>,
    decoders: Vec<Arc<dyn DecoderFactory>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    decode_interceptors: Vec<Arc<dyn DecodeInterceptor>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field(
                "fetchers",
                &self.fetchers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "decoders",
                &self.decoders.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "request_interceptors",
                &self
                    .request_interceptors
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "decode_interceptors",
                &self
                    .decode_interceptors
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fetcher factory.
    pub fn add_fetcher(&mut self, factory: Arc<dyn FetcherFactory>) -> &mut Self {
        self.fetchers.push(factory);
        self
    }

    /// Append a decoder factory.
    pub fn add_decoder(&mut self, factory: Arc<dyn DecoderFactory>) -> &mut Self {
        self.decoders.push(factory);
        self
    }

    /// Append a request interceptor.
    pub fn add_request_interceptor(&mut self, stage: Arc<dyn RequestInterceptor>) -> &mut Self {
        self.request_interceptors.push(stage);
        self
    }

    /// Append a decode interceptor.
    pub fn add_decode_interceptor(&mut self, stage: Arc<dyn DecodeInterceptor>) -> &mut Self {
        self.decode_interceptors.push(stage);
        self
    }

    /// Fetcher factories in lookup order.
    pub fn fetchers(&self) -> &[Arc<dyn FetcherFactory>] {
        &self.fetchers
    }

    /// Decoder factories in lookup order.
    pub fn decoders(&self) -> &[Arc<dyn DecoderFactory>] {
        &self.decoders
    }

    /// Request stages, outermost first.
    pub fn request_interceptors(&self) -> &[Arc<dyn RequestInterceptor>] {
        &self.request_interceptors
    }

    /// Decode stages, outermost first.
    pub fn decode_interceptors(&self) -> &[Arc<dyn DecodeInterceptor>] {
        &self.decode_interceptors
    }

    /// `true` when every list is empty.
    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
            && self.decoders.is_empty()
            && self.request_interceptors.is_empty()
            && self.decode_interceptors.is_empty()
    }

    /// Request-level entries first, then `base`, per list.
    pub fn merged(request_level: Option<&Self>, base: &Self) -> Self {
        let Some(front) = request_level else {
            return base.clone();
        };
        Self {
            fetchers: chain(&front.fetchers, &base.fetchers),
            decoders: chain(&front.decoders, &base.decoders),
            request_interceptors: chain(&front.request_interceptors, &base.request_interceptors),
            decode_interceptors: chain(&front.decode_interceptors, &base.decode_interceptors),
        }
    }

    /// Fetcher lookup over this registry's factories.
    pub fn fetcher_registry(&self) -> FetcherRegistry {
        FetcherRegistry::new(self.fetchers.clone())
    }

    /// Decoder lookup over this registry's factories.
    pub fn decoder_registry(&self) -> DecoderRegistry {
        DecoderRegistry::new(self.decoders.clone())
    }

    /// Built-in parts, in pipeline order. Terminal engine stages come last.
    pub(crate) fn defaults(
        config: &LoaderConfig,
        resolver: Option<Arc<dyn ContentResolver>>,
        bundle: Option<Arc<ResourceBundle>>,
    ) -> Self {
        let mut out = Self::new();
        out.add_fetcher(Arc::new(FileFetcherFactory));
        if let Some(root) = &config.asset_root {
            out.add_fetcher(Arc::new(AssetFetcherFactory::new(root.clone())));
        }
        if let Some(resolver) = resolver {
            out.add_fetcher(Arc::new(ContentFetcherFactory::new(resolver)));
        }
        if let Some(bundle) = bundle {
            out.add_fetcher(Arc::new(ResourceFetcherFactory::new(bundle)));
        }
        out.add_fetcher(Arc::new(DataUriFetcherFactory));

        out.add_decoder(Arc::new(GifDecoderFactory))
            .add_decoder(Arc::new(StaticDecoderFactory));

        out.add_request_interceptor(Arc::new(ValidateRequestInterceptor))
            .add_request_interceptor(Arc::new(MemoryCacheRequestInterceptor))
            .add_request_interceptor(Arc::new(EngineRequestInterceptor));

        out.add_decode_interceptor(Arc::new(ResultCacheDecodeInterceptor))
            .add_decode_interceptor(Arc::new(TransformationDecodeInterceptor))
            .add_decode_interceptor(Arc::new(PixelFormatDecodeInterceptor))
            .add_decode_interceptor(Arc::new(ResizeDecodeInterceptor))
            .add_decode_interceptor(Arc::new(EngineDecodeInterceptor));
        out
    }
}

fn chain<T: ?Sized>(front: &[Arc<T>], back: &[Arc<T>]) -> Vec<Arc<T>> {
    front.iter().chain(back).cloned().collect()
}

#[cfg(test)]
#[path = "../../tests/unit/loader/components.rs"]
mod tests;
