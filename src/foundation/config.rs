use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::core::Size;
use crate::foundation::error::{LoomError, LoomResult};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Location and budget of one disk cache tier.
pub struct DiskCacheConfig {
    /// Directory holding committed entries. Created on open.
    pub dir: PathBuf,
    /// Upper bound on the summed size of committed entries.
    #[serde(default = "default_disk_cache_max_bytes")]
    pub max_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Bounds for the reusable raster pool.
pub struct BufferPoolConfig {
    /// Maximum bytes retained across all free buffers.
    #[serde(default = "default_pool_bytes")]
    pub max_pool_bytes: usize,
    /// Maximum number of free buffers retained.
    #[serde(default = "default_pool_buffers")]
    pub max_buffers: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            max_pool_bytes: default_pool_bytes(),
            max_buffers: default_pool_buffers(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Loader-wide configuration.
///
/// Every field has a default, so `{}` is a valid JSON document. A missing cache section disables
/// that tier.
pub struct LoaderConfig {
    /// Data (source bytes) disk cache.
    #[serde(default)]
    pub disk_cache: Option<DiskCacheConfig>,
    /// Decoded-result disk cache.
    #[serde(default)]
    pub result_cache: Option<DiskCacheConfig>,
    /// Memory cache budget in bytes. Zero disables the tier.
    #[serde(default = "default_memory_cache_bytes")]
    pub memory_cache_max_bytes: usize,
    /// Raster pool bounds.
    #[serde(default)]
    pub buffer_pool: BufferPoolConfig,
    /// Decode worker count. `None` uses rayon defaults.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Directory backing `asset://` identifiers.
    #[serde(default)]
    pub asset_root: Option<PathBuf>,
    /// Max size applied to requests that do not carry one.
    #[serde(default)]
    pub default_max_size: Option<Size>,
    /// Largest decoded dimension; sampling grows until both sides fit.
    #[serde(default = "default_max_bitmap_size")]
    pub max_bitmap_size: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            disk_cache: None,
            result_cache: None,
            memory_cache_max_bytes: default_memory_cache_bytes(),
            buffer_pool: BufferPoolConfig::default(),
            worker_threads: None,
            asset_root: None,
            default_max_size: None,
            max_bitmap_size: default_max_bitmap_size(),
        }
    }
}

impl LoaderConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> LoomResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| LoomError::validation(format!("invalid loader config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> LoomResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read loader config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> LoomResult<()> {
        if let Some(0) = self.worker_threads {
            return Err(LoomError::validation(
                "loader worker_threads must be >= 1 when set",
            ));
        }
        if self.max_bitmap_size == 0 {
            return Err(LoomError::validation("loader max_bitmap_size must be > 0"));
        }
        if let Some(size) = self.default_max_size
            && size.is_empty()
        {
            return Err(LoomError::validation(
                "loader default_max_size width/height must be > 0",
            ));
        }
        for (name, tier) in [
            ("disk_cache", &self.disk_cache),
            ("result_cache", &self.result_cache),
        ] {
            if let Some(tier) = tier {
                if tier.dir.as_os_str().is_empty() {
                    return Err(LoomError::validation(format!(
                        "loader {name}.dir must be non-empty"
                    )));
                }
                if tier.max_bytes == 0 {
                    return Err(LoomError::validation(format!(
                        "loader {name}.max_bytes must be > 0"
                    )));
                }
            }
        }
        if let (Some(data), Some(result)) = (&self.disk_cache, &self.result_cache)
            && data.dir == result.dir
        {
            return Err(LoomError::validation(
                "loader disk_cache and result_cache must use different directories",
            ));
        }
        Ok(())
    }
}

fn default_disk_cache_max_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_pool_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_pool_buffers() -> usize {
    32
}

fn default_memory_cache_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_bitmap_size() -> u32 {
    16_384
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
