use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::foundation::core::{CachePolicy, PixelFormat, Resize, Size};
use crate::foundation::error::LoomError;
use crate::foundation::lifecycle::Lifecycle;
use crate::loader::components::ComponentRegistry;
use crate::request::result::ImageData;
use crate::transform::Transformation;

/// Consumer of one request's outcome.
///
/// `on_start` fires first, then exactly one of the other callbacks. Cancellation never reaches
/// `on_error`.
pub trait Target: Send + Sync {
    /// The request entered the pipeline.
    fn on_start(&self, _request: &ImageRequest) {}

    /// A result was produced.
    fn on_success(&self, _request: &ImageRequest, _data: &ImageData) {}

    /// The pipeline failed with a tagged error.
    fn on_error(&self, _request: &ImageRequest, _error: &LoomError) {}

    /// The lifecycle was cancelled before a result was delivered.
    fn on_cancel(&self, _request: &ImageRequest) {}
}

/// Immutable description of one image load.
///
/// Interceptors never mutate a request; they derive a new one with
/// [`new_builder`](Self::new_builder) and forward that.
#[derive(Clone)]
pub struct ImageRequest {
    uri: String,
    target: Option<Arc<dyn Target>>,
    max_size: Option<Size>,
    resize: Option<Resize>,
    transformations: Vec<Arc<dyn Transformation>>,
    pixel_format: Option<PixelFormat>,
    disallow_animated: bool,
    disable_buffer_pool: bool,
    ignore_exif_orientation: bool,
    disk_cache_policy: CachePolicy,
    result_cache_policy: CachePolicy,
    memory_cache_policy: CachePolicy,
    parameters: BTreeMap<String, String>,
    components: Option<Arc<ComponentRegistry>>,
    lifecycle: Lifecycle,
}

impl ImageRequest {
    /// Start building a request for `uri`.
    pub fn builder(uri: impl Into<String>) -> ImageRequestBuilder {
        ImageRequestBuilder {
            req: Self {
                uri: uri.into(),
                target: None,
                max_size: None,
                resize: None,
                transformations: Vec::new(),
                pixel_format: None,
                disallow_animated: false,
                disable_buffer_pool: false,
                ignore_exif_orientation: false,
                disk_cache_policy: CachePolicy::Enabled,
                result_cache_policy: CachePolicy::Enabled,
                memory_cache_policy: CachePolicy::Enabled,
                parameters: BTreeMap::new(),
                components: None,
                lifecycle: Lifecycle::new(),
            },
        }
    }

    /// Builder pre-filled with this request's values. The lifecycle is shared.
    pub fn new_builder(&self) -> ImageRequestBuilder {
        ImageRequestBuilder { req: self.clone() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn target(&self) -> Option<&Arc<dyn Target>> {
        self.target.as_ref()
    }

    /// Upper bound used to pick a decode sample size.
    pub fn max_size(&self) -> Option<Size> {
        self.max_size
    }

    /// Final size constraint.
    pub fn resize(&self) -> Option<Resize> {
        self.resize
    }

    pub fn transformations(&self) -> &[Arc<dyn Transformation>] {
        &self.transformations
    }

    /// Preferred output pixel format.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixel_format
    }

    /// Decode only the first frame of animated formats.
    pub fn disallow_animated(&self) -> bool {
        self.disallow_animated
    }

    /// Decode into fresh storage instead of pooled buffers.
    pub fn disable_buffer_pool(&self) -> bool {
        self.disable_buffer_pool
    }

    /// Skip EXIF orientation correction.
    pub fn ignore_exif_orientation(&self) -> bool {
        self.ignore_exif_orientation
    }

    /// Data (source bytes) disk cache policy.
    pub fn disk_cache_policy(&self) -> CachePolicy {
        self.disk_cache_policy
    }

    /// Decoded-result disk cache policy.
    pub fn result_cache_policy(&self) -> CachePolicy {
        self.result_cache_policy
    }

    pub fn memory_cache_policy(&self) -> CachePolicy {
        self.memory_cache_policy
    }

    /// Extra key/value parameters, sorted by key.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Request-level components, consulted before the loader's.
    pub fn components(&self) -> Option<&Arc<ComponentRegistry>> {
        self.components.as_ref()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Key identifying the delivered result.
    ///
    /// Transformation keys keep their order; parameters are sorted, so their insertion order
    /// does not matter. Targets, cache policies and lifecycles are not part of the key.
    ///
    /// The identifier, transformation keys and parameters are escaped, so delimiter characters
    /// inside them cannot make two different requests share a key.
    pub fn cache_key(&self) -> String {
        let mut parts = Vec::new();
        if let Some(size) = self.max_size {
            parts.push(format!("maxSize={size}"));
        }
        if let Some(resize) = self.resize {
            parts.push(format!("resize={}", resize.key()));
        }
        if !self.transformations.is_empty() {
            let keys = self
                .transformations
                .iter()
                .map(|t| escape_key_part(&t.key()))
                .collect::<Vec<_>>();
            parts.push(format!("transformations=[{}]", keys.join(",")));
        }
        if let Some(format) = self.pixel_format {
            parts.push(format!("pixelFormat={format:?}"));
        }
        if self.disallow_animated {
            parts.push("disallowAnimated".to_string());
        }
        if self.ignore_exif_orientation {
            parts.push("ignoreExifOrientation".to_string());
        }
        if !self.parameters.is_empty() {
            let pairs = self
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", escape_key_part(k), escape_key_part(v)))
                .collect::<Vec<_>>();
            parts.push(format!("parameters=[{}]", pairs.join(",")));
        }
        let uri = escape_key_part(&self.uri);
        if parts.is_empty() {
            uri
        } else {
            format!("{uri}?{}", parts.join("&"))
        }
    }
}

// Percent-encodes the characters `cache_key` uses as delimiters.
fn escape_key_part(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' | '?' | '&' | '=' | ',' | '[' | ']' => {
                out.push_str(&format!("%{:02X}", c as u32));
            }
            _ => out.push(c),
        }
    }
    out
}

impl PartialEq for ImageRequest {
    fn eq(&self, other: &Self) -> bool {
        let same_target = match (&self.target, &other.target) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        let same_components = match (&self.components, &other.components) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_target
            && same_components
            && self.lifecycle.same_as(&other.lifecycle)
            && self.disk_cache_policy == other.disk_cache_policy
            && self.result_cache_policy == other.result_cache_policy
            && self.memory_cache_policy == other.memory_cache_policy
            && self.disable_buffer_pool == other.disable_buffer_pool
            && self.cache_key() == other.cache_key()
    }
}

impl fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRequest")
            .field("uri", &self.uri)
            .field("max_size", &self.max_size)
            .field("resize", &self.resize)
            .field("transformations", &self.transformations)
            .field("pixel_format", &self.pixel_format)
            .field("disk_cache_policy", &self.disk_cache_policy)
            .field("result_cache_policy", &self.result_cache_policy)
            .field("memory_cache_policy", &self.memory_cache_policy)
            .field("parameters", &self.parameters)
            .field("cancelled", &self.lifecycle.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ImageRequest`].
#[must_use]
pub struct ImageRequestBuilder {
    req: ImageRequest,
}

impl ImageRequestBuilder {
    /// Replace the identifier.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.req.uri = uri.into();
        self
    }

    /// Set the consumer.
    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.req.target = Some(target);
        self
    }

    /// Bound the decoded size.
    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.req.max_size = Some(Size::new(width, height));
        self
    }

    /// Require a final size.
    pub fn resize(mut self, resize: Resize) -> Self {
        self.req.resize = Some(resize);
        self
    }

    /// Append a transformation.
    pub fn transformation(mut self, t: Arc<dyn Transformation>) -> Self {
        self.req.transformations.push(t);
        self
    }

    /// Replace the transformation list.
    pub fn transformations(mut self, list: Vec<Arc<dyn Transformation>>) -> Self {
        self.req.transformations = list;
        self
    }

    /// Preferred output pixel format.
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.req.pixel_format = Some(format);
        self
    }

    /// Decode only the first frame of animated formats.
    pub fn disallow_animated(mut self, yes: bool) -> Self {
        self.req.disallow_animated = yes;
        self
    }

    /// Decode into fresh storage instead of pooled buffers.
    pub fn disable_buffer_pool(mut self, yes: bool) -> Self {
        self.req.disable_buffer_pool = yes;
        self
    }

    /// Skip EXIF orientation correction.
    pub fn ignore_exif_orientation(mut self, yes: bool) -> Self {
        self.req.ignore_exif_orientation = yes;
        self
    }

    /// Data disk cache policy.
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.req.disk_cache_policy = policy;
        self
    }

    /// Result disk cache policy.
    pub fn result_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.req.result_cache_policy = policy;
        self
    }

    pub fn memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.req.memory_cache_policy = policy;
        self
    }

    /// Add or replace a parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.req.parameters.insert(key.into(), value.into());
        self
    }

    /// Request-level components.
    pub fn components(mut self, components: Arc<ComponentRegistry>) -> Self {
        self.req.components = Some(components);
        self
    }

    /// Use an existing lifecycle (for cancelling from outside).
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.req.lifecycle = lifecycle;
        self
    }

    /// Finish. Field validation happens when the request enters the pipeline.
    pub fn build(self) -> ImageRequest {
        self.req
    }
}

#[cfg(test)]
#[path = "../../tests/unit/request/model.rs"]
mod tests;
