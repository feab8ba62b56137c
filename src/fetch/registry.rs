use std::sync::Arc;

use crate::foundation::error::{LoomError, LoomResult};
use crate::request::model::ImageRequest;
use crate::source::data_source::SharedDataSource;

/// Byte source plus declared content type, handed from fetch to decode.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Where the bytes are.
    pub data_source: SharedDataSource,
    /// Declared mime type, if the origin has one.
    pub mime_type: Option<String>,
}

impl FetchResult {
    /// Pair a source with its declared mime type.
    pub fn new(data_source: SharedDataSource, mime_type: Option<String>) -> Self {
        Self {
            data_source,
            mime_type,
        }
    }
}

/// Fetcher bound to one request.
pub trait Fetcher: Send {
    /// Resolve to a byte source. Runs on a worker thread.
    fn fetch(self: Box<Self>) -> LoomResult<FetchResult>;
}

/// Inspects a request identifier and either declines or binds a [`Fetcher`].
///
/// Matching is local: a factory never consults the ones after it.
pub trait FetcherFactory: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Bind a fetcher, or `None` to decline.
    fn try_create(&self, request: &ImageRequest) -> Option<Box<dyn Fetcher>>;
}

/// Ordered fetcher factories; the first that accepts wins.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    factories: Vec<Arc<dyn FetcherFactory>>,
}

impl std::fmt::Debug for FetcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|x| x.name()))
            .finish()
    }
}

impl FetcherRegistry {
    /// Registry over `factories`, in priority order.
    pub fn new(factories: Vec<Arc<dyn FetcherFactory>>) -> Self {
        Self { factories }
    }

    pub fn factories(&self) -> &[Arc<dyn FetcherFactory>] {
        &self.factories
    }

    /// Fetcher of the first factory that accepts `request`.
    pub fn fetcher_for(&self, request: &ImageRequest) -> LoomResult<Box<dyn Fetcher>> {
        for factory in &self.factories {
            if let Some(fetcher) = factory.try_create(request) {
                tracing::debug!(factory = factory.name(), uri = request.uri(), "fetcher resolved");
                return Ok(fetcher);
            }
        }
        Err(LoomError::unsupported(request.uri().to_string()))
    }

    /// Resolve and run the fetcher for `request`.
    pub fn resolve(&self, request: &ImageRequest) -> LoomResult<FetchResult> {
        self.fetcher_for(request)?.fetch()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/registry.rs"]
mod tests;
