use std::sync::Arc;

use crate::cache::disk::DiskCache;
use crate::cache::memory::MemoryCache;
use crate::foundation::config::{DiskCacheConfig, LoaderConfig};
use crate::foundation::error::{LoomError, LoomResult};
use crate::foundation::lifecycle::Lifecycle;
use crate::loader::components::ComponentRegistry;
use crate::loader::worker::WorkerPool;
use crate::raster::pool::BufferPool;
use crate::request::interceptor::{RequestChain, RequestInterceptor};
use crate::request::model::ImageRequest;
use crate::request::result::{ImageData, ImageResult};
use crate::source::sources::{ContentResolver, ResourceBundle};

struct LoaderShared {
    config: LoaderConfig,
    pool: Arc<BufferPool>,
    data_cache: Arc<DiskCache>,
    result_cache: Arc<DiskCache>,
    memory_cache: MemoryCache,
    components: ComponentRegistry,
    workers: WorkerPool,
}

/// Entry point: owns the caches, the raster pool, the worker pool and the component lists.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ImageLoader {
    shared: Arc<LoaderShared>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.shared.config)
            .field("components", &self.shared.components)
            .field("workers", &self.shared.workers.threads())
            .finish_non_exhaustive()
    }
}

/// Configures an [`ImageLoader`].
#[must_use]
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    extra: ComponentRegistry,
    resolver: Option<Arc<dyn ContentResolver>>,
    bundle: Option<Arc<ResourceBundle>>,
}

impl ImageLoaderBuilder {
    /// Components consulted before the built-in ones.
    pub fn components(mut self, extra: ComponentRegistry) -> Self {
        self.extra = extra;
        self
    }

    /// Enable `content://` identifiers.
    pub fn content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Enable `res://` identifiers.
    pub fn resources(mut self, bundle: Arc<ResourceBundle>) -> Self {
        self.bundle = Some(bundle);
        self
    }

    /// Validate the config, open the caches and start the workers.
    pub fn build(self) -> LoomResult<ImageLoader> {
        self.config.validate()?;
        let open = |tier: &Option<DiskCacheConfig>| match tier {
            Some(cfg) => DiskCache::open(cfg),
            None => Ok(DiskCache::disabled()),
        };
        let data_cache = Arc::new(open(&self.config.disk_cache)?);
        let result_cache = Arc::new(open(&self.config.result_cache)?);
        let pool = Arc::new(BufferPool::new(self.config.buffer_pool));
        let memory_cache = MemoryCache::new(self.config.memory_cache_max_bytes, pool.clone());
        let workers = WorkerPool::new(self.config.worker_threads)?;
        let defaults = ComponentRegistry::defaults(&self.config, self.resolver, self.bundle);
        let components = ComponentRegistry::merged(Some(&self.extra), &defaults);

        tracing::debug!(
            data_cache = data_cache.is_enabled(),
            result_cache = result_cache.is_enabled(),
            memory_cache = memory_cache.is_enabled(),
            workers = workers.threads(),
            "image loader ready"
        );
        Ok(ImageLoader {
            shared: Arc::new(LoaderShared {
                config: self.config,
                pool,
                data_cache,
                result_cache,
                memory_cache,
                components,
                workers,
            }),
        })
    }
}

impl ImageLoader {
    /// Start a builder for extra components, a content resolver or a resource bundle.
    pub fn builder(config: LoaderConfig) -> ImageLoaderBuilder {
        ImageLoaderBuilder {
            config,
            extra: ComponentRegistry::new(),
            resolver: None,
            bundle: None,
        }
    }

    /// Loader with built-in components only.
    pub fn new(config: LoaderConfig) -> LoomResult<Self> {
        Self::builder(config).build()
    }

    /// Validated configuration this loader was built from.
    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }

    /// Shared raster buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.shared.pool
    }

    /// Source bytes disk cache.
    pub fn data_cache(&self) -> &Arc<DiskCache> {
        &self.shared.data_cache
    }

    /// Decoded result disk cache.
    pub fn result_cache(&self) -> &Arc<DiskCache> {
        &self.shared.result_cache
    }

    /// In-memory result cache.
    pub fn memory_cache(&self) -> &MemoryCache {
        &self.shared.memory_cache
    }

    /// Loader-level components, extras first.
    pub fn components(&self) -> &ComponentRegistry {
        &self.shared.components
    }

    /// Decode worker pool.
    pub fn workers(&self) -> &WorkerPool {
        &self.shared.workers
    }

    /// Components for `request`: its own registry first, then the loader's.
    pub fn components_for(&self, request: &ImageRequest) -> ComponentRegistry {
        ComponentRegistry::merged(request.components().map(|c| c.as_ref()), self.components())
    }

    /// Run `request` to completion on the current task.
    ///
    /// The target sees `on_start`, then exactly one of `on_success`, `on_error` or `on_cancel`.
    #[tracing::instrument(level = "debug", skip_all, fields(uri = request.uri()))]
    pub async fn execute(&self, request: ImageRequest) -> ImageResult {
        if let Some(target) = request.target() {
            target.on_start(&request);
        }
        let lifecycle = request.lifecycle().clone();
        let components = self.components_for(&request);
        let stages: Arc<[Arc<dyn RequestInterceptor>]> =
            Arc::from(components.request_interceptors());
        let chain = RequestChain::start(stages, request.clone(), self.clone());

        let outcome = tokio::select! {
            biased;
            () = lifecycle.cancelled() => Err(LoomError::Cancelled),
            out = chain.proceed(request.clone()) => out,
        };
        let result = match outcome {
            Ok(data) if lifecycle.is_cancelled() => {
                self.recycle(data);
                ImageResult::Cancelled { request }
            }
            Ok(data) => ImageResult::Success { request, data },
            Err(e) if e.is_cancelled() => ImageResult::Cancelled { request },
            Err(error) => ImageResult::Error { request, error },
        };
        deliver(&result);
        result
    }

    /// Spawn `request` on the tokio runtime.
    pub fn load(&self, request: ImageRequest) -> LoadHandle {
        let loader = self.clone();
        let lifecycle = request.lifecycle().clone();
        let kept = request.clone();
        let task = tokio::spawn(async move { loader.execute(request).await });
        LoadHandle {
            request: kept,
            lifecycle,
            task,
        }
    }

    /// Return a delivered bitmap to the pool. `false` while other holders remain.
    pub fn recycle(&self, data: ImageData) -> bool {
        match Arc::try_unwrap(data.image) {
            Ok(image) => {
                image.release_into(&self.shared.pool, "recycled by caller");
                true
            }
            Err(_) => false,
        }
    }
}

fn deliver(result: &ImageResult) {
    let request = result.request();
    let Some(target) = request.target() else {
        return;
    };
    match result {
        ImageResult::Success { data, .. } => target.on_success(request, data),
        ImageResult::Error { error, .. } => target.on_error(request, error),
        ImageResult::Cancelled { .. } => target.on_cancel(request),
    }
}

/// Handle to a spawned load.
#[derive(Debug)]
pub struct LoadHandle {
    request: ImageRequest,
    lifecycle: Lifecycle,
    task: tokio::task::JoinHandle<ImageResult>,
}

impl LoadHandle {
    /// Cancel the request. The result becomes [`ImageResult::Cancelled`] unless it already
    /// finished.
    pub fn cancel(&self) {
        self.lifecycle.cancel();
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome.
    pub async fn await_result(self) -> ImageResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => ImageResult::Error {
                request: self.request,
                error: LoomError::Other(anyhow::anyhow!("load task failed: {e}")),
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/loader/loader.rs"]
mod tests;
