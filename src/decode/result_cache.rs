use std::io::Write;

use crate::cache::disk::DiskCache;
use crate::decode::decoder::{DecodeResult, DecodedImage};
use crate::decode::interceptor::{DecodeChain, DecodeContext, DecodeInterceptor};
use crate::foundation::core::{DataFrom, ImageInfo, PixelFormat};
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::{Raster, byte_len};

/// Sidecar describing a cached pixel entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct ResultMeta {
    width: u32,
    height: u32,
    format: PixelFormat,
    info: ImageInfo,
    transformed: Vec<String>,
    sample_size: u32,
}

fn pixels_key(key: &str) -> String {
    format!("{key}_result_pixels")
}

fn meta_key(key: &str) -> String {
    format!("{key}_result_meta")
}

/// Serves finished bitmaps from the result disk cache and stores new ones.
///
/// Only requests that change the source (resize or transformations) take part. Lookup and
/// store for one cache key run under that key's edit lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultCacheDecodeInterceptor;

impl ResultCacheDecodeInterceptor {
    fn read(ctx: &DecodeContext, key: &str) -> LoomResult<Option<DecodeResult>> {
        let cache = ctx.result_cache();
        let (Some(meta_entry), Some(pixel_entry)) =
            (cache.get(&meta_key(key)), cache.get(&pixels_key(key)))
        else {
            return Ok(None);
        };
        let meta: ResultMeta = serde_json::from_slice(&meta_entry.read_all()?)
            .map_err(|e| LoomError::decode_failed(format!("result metadata: {e}")))?;
        let expected = byte_len(meta.width, meta.height, meta.format);
        if pixel_entry.size() != expected as u64 {
            return Err(LoomError::decode_failed(format!(
                "result pixels are {} bytes, metadata says {expected}",
                pixel_entry.size()
            )));
        }
        let bytes = pixel_entry.read_all()?;
        let raster = if ctx.request().disable_buffer_pool() {
            Raster::from_vec(meta.width, meta.height, meta.format, bytes)?
        } else {
            ctx.pool()
                .acquire_copy(meta.width, meta.height, meta.format, &bytes)?
        };
        Ok(Some(DecodeResult {
            image: DecodedImage::Bitmap(raster),
            info: meta.info,
            data_from: DataFrom::ResultCache,
            transformed: meta.transformed,
            sample_size: meta.sample_size,
        }))
    }

    fn write_entry(cache: &DiskCache, key: &str, bytes: &[u8]) -> LoomResult<()> {
        let mut editor = cache
            .edit(key)
            .ok_or_else(|| LoomError::cache_unusable(format!("no editor for '{key}'")))?;
        let written = editor.new_output_stream().and_then(|mut out| {
            out.write_all(bytes)
                .and_then(|()| out.flush())
                .map_err(|e| LoomError::cache_unusable(format!("write '{key}': {e}")))
        });
        match written {
            Ok(()) => editor.commit().map(|_| ()),
            Err(e) => {
                editor.abort();
                Err(e)
            }
        }
    }

    fn write(ctx: &DecodeContext, key: &str, result: &DecodeResult) -> LoomResult<()> {
        let Some(raster) = result.bitmap() else {
            return Ok(());
        };
        let cache = ctx.result_cache();
        let meta = ResultMeta {
            width: raster.width(),
            height: raster.height(),
            format: raster.format(),
            info: result.info.clone(),
            transformed: result.transformed.clone(),
            sample_size: result.sample_size,
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| LoomError::cache_unusable(format!("encode result metadata: {e}")))?;

        Self::write_entry(cache, &pixels_key(key), raster.data())?;
        if let Err(e) = Self::write_entry(cache, &meta_key(key), &meta_json) {
            cache.remove(&pixels_key(key));
            return Err(e);
        }
        Ok(())
    }
}

impl DecodeInterceptor for ResultCacheDecodeInterceptor {
    fn name(&self) -> &str {
        "result_cache"
    }

    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        let ctx = chain.context();
        let request = ctx.request();
        let policy = request.result_cache_policy();
        let changes_source = request.resize().is_some() || !request.transformations().is_empty();
        if !ctx.result_cache().is_enabled() || !policy.read_or_write() || !changes_source {
            return chain.proceed();
        }

        let key = request.cache_key();
        let _guard = ctx.result_cache().edit_lock_blocking(&key);
        if policy.read_enabled() {
            match Self::read(ctx, &key) {
                Ok(Some(hit)) => {
                    tracing::debug!(key = %key, "result disk cache hit");
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "dropping corrupt result cache entry");
                    ctx.result_cache().remove(&meta_key(&key));
                    ctx.result_cache().remove(&pixels_key(&key));
                }
            }
        }

        let result = chain.proceed()?;
        if policy.write_enabled()
            && !result.image.is_animated()
            && let Err(e) = Self::write(ctx, &key, &result)
        {
            tracing::warn!(key = %key, error = %e, "result cache store failed");
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/result_cache.rs"]
mod tests;
