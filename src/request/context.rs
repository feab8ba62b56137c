use parking_lot::Mutex;

use crate::request::model::ImageRequest;

/// Per-request state that survives request replacement along the chain.
///
/// Keeps the ordered log of distinct request values seen, so mid-flight modifications can be
/// diagnosed. The cache key always comes from the latest value.
#[derive(Debug)]
pub struct RequestContext {
    requests: Mutex<Vec<ImageRequest>>,
}

impl RequestContext {
    /// Context seeded with the request as it entered the pipeline.
    pub fn new(initial: ImageRequest) -> Self {
        Self {
            requests: Mutex::new(vec![initial]),
        }
    }

    /// Log `request` unless it equals the latest entry.
    pub fn record(&self, request: &ImageRequest) {
        let mut log = self.requests.lock();
        if log.last() != Some(request) {
            log.push(request.clone());
        }
    }

    /// Every distinct request value, oldest first.
    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().clone()
    }

    /// Latest request value.
    pub fn request(&self) -> ImageRequest {
        let log = self.requests.lock();
        log[log.len() - 1].clone()
    }

    /// Cache key of the latest request value.
    pub fn cache_key(&self) -> String {
        let log = self.requests.lock();
        log[log.len() - 1].cache_key()
    }
}
