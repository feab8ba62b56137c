use std::sync::Arc;

use crate::foundation::error::{LoomError, LoomResult};
use crate::loader::loader::ImageLoader;
use crate::request::context::RequestContext;
use crate::request::model::ImageRequest;
use crate::request::result::ImageData;

/// Top-level pipeline stage.
///
/// A stage may return a result without forwarding (short-circuit), forward the request it was
/// given, or forward a new request value and post-process what comes back.
#[async_trait::async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Handle one request.
    async fn intercept(&self, chain: RequestChain) -> LoomResult<ImageData>;
}

/// Position in the request stage list.
///
/// Each stage receives the chain already advanced past itself; [`proceed`](Self::proceed) runs
/// the next one.
pub struct RequestChain {
    stages: Arc<[Arc<dyn RequestInterceptor>]>,
    index: usize,
    request: ImageRequest,
    context: Arc<RequestContext>,
    loader: ImageLoader,
}

impl RequestChain {
    pub(crate) fn start(
        stages: Arc<[Arc<dyn RequestInterceptor>]>,
        request: ImageRequest,
        loader: ImageLoader,
    ) -> Self {
        Self {
            stages,
            index: 0,
            context: Arc::new(RequestContext::new(request.clone())),
            request,
            loader,
        }
    }

    /// Request value this stage was handed.
    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// State shared by every stage of this run.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Loader running this chain.
    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Index of the next stage to run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Forward `request` to the next stage.
    pub async fn proceed(self, request: ImageRequest) -> LoomResult<ImageData> {
        request.lifecycle().check()?;
        self.context.record(&request);
        let stage = self.stages.get(self.index).cloned().ok_or_else(|| {
            LoomError::validation("request chain ran past its terminal interceptor")
        })?;
        tracing::trace!(stage = stage.name(), index = self.index, "request chain");
        let next = Self {
            stages: self.stages,
            index: self.index + 1,
            request,
            context: self.context,
            loader: self.loader,
        };
        stage.intercept(next).await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/request/interceptor.rs"]
mod tests;
