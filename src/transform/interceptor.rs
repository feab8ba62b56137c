use crate::decode::decoder::{DecodeResult, DecodedImage};
use crate::decode::interceptor::{DecodeChain, DecodeInterceptor};
use crate::foundation::error::{LoomError, LoomResult};

/// Folds the request's transformations over the decoded bitmap, in order.
///
/// Every discarded intermediate goes back to the pool exactly once. A failing transformation is
/// skipped; cancellation between steps releases the current raster and stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformationDecodeInterceptor;

impl DecodeInterceptor for TransformationDecodeInterceptor {
    fn name(&self) -> &str {
        "transformation"
    }

    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        let ctx = chain.context();
        let request = ctx.request();
        if request.transformations().is_empty() {
            return chain.proceed();
        }
        let result = chain.proceed()?;
        let DecodeResult {
            image,
            info,
            data_from,
            mut transformed,
            sample_size,
        } = result;
        let mut current = match image {
            DecodedImage::Bitmap(r) => r,
            other => {
                tracing::debug!("transformations skipped for animated image");
                return Ok(DecodeResult {
                    image: other,
                    info,
                    data_from,
                    transformed,
                    sample_size,
                });
            }
        };

        let pool = ctx.pool();
        for t in request.transformations() {
            if request.lifecycle().is_cancelled() {
                pool.recycle(current, "cancelled during transformations");
                return Err(LoomError::Cancelled);
            }
            match t.transform(pool, &current) {
                Ok(Some(out)) => {
                    let previous = std::mem::replace(&mut current, out.raster);
                    pool.recycle(previous, "transformed");
                    transformed.push(out.transformed);
                }
                Ok(None) => {}
                Err(LoomError::Cancelled) => {
                    pool.recycle(current, "cancelled during transformations");
                    return Err(LoomError::Cancelled);
                }
                Err(e) => {
                    tracing::warn!(transformation = %t.key(), error = %e, "transformation skipped");
                }
            }
        }

        Ok(DecodeResult {
            image: DecodedImage::Bitmap(current),
            info,
            data_from,
            transformed,
            sample_size,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/interceptor.rs"]
mod tests;
