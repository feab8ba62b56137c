use crate::foundation::error::{LoomError, LoomResult};
use crate::request::interceptor::{RequestChain, RequestInterceptor};
use crate::request::result::ImageData;

/// Rejects malformed requests and applies the loader's default max size.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidateRequestInterceptor;

#[async_trait::async_trait]
impl RequestInterceptor for ValidateRequestInterceptor {
    fn name(&self) -> &str {
        "validate"
    }

    async fn intercept(&self, chain: RequestChain) -> LoomResult<ImageData> {
        let request = chain.request();
        if request.uri().trim().is_empty() {
            return Err(LoomError::validation("request uri is blank"));
        }
        if let Some(size) = request.max_size()
            && size.is_empty()
        {
            return Err(LoomError::validation(format!("max size {size} has a zero side")));
        }
        if let Some(resize) = request.resize()
            && resize.size.is_empty()
        {
            return Err(LoomError::validation(format!(
                "resize {} has a zero side",
                resize.size
            )));
        }

        let forwarded = match (request.max_size(), chain.loader().config().default_max_size) {
            (None, Some(default)) => request
                .new_builder()
                .max_size(default.width, default.height)
                .build(),
            _ => request.clone(),
        };
        chain.proceed(forwarded).await
    }
}
