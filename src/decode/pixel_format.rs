use crate::decode::decoder::DecodeResult;
use crate::decode::interceptor::{DecodeChain, DecodeInterceptor};
use crate::foundation::core::PixelFormat;
use crate::foundation::error::LoomResult;
use crate::raster::buffer::{Raster, luma, premultiply_rgba8_in_place, unpremultiply_rgba8_in_place};
use crate::raster::pool::BufferPool;

/// Copy of `src` in `to`, or `None` when it is already in that format.
pub fn convert(pool: &BufferPool, src: &Raster, to: PixelFormat) -> LoomResult<Option<Raster>> {
    let from = src.format();
    if from == to {
        return Ok(None);
    }
    let (w, h) = (src.width(), src.height());
    let out = match (from, to) {
        (PixelFormat::Rgba8, PixelFormat::Rgba8Premul) => {
            let mut out = pool.acquire_copy(w, h, from, src.data())?;
            premultiply_rgba8_in_place(out.data_mut());
            out.set_format(to);
            out
        }
        (PixelFormat::Rgba8Premul, PixelFormat::Rgba8) => {
            let mut out = pool.acquire_copy(w, h, from, src.data())?;
            unpremultiply_rgba8_in_place(out.data_mut());
            out.set_format(to);
            out
        }
        (PixelFormat::Rgba8 | PixelFormat::Rgba8Premul, PixelFormat::L8) => {
            let mut out = pool.acquire(w, h, PixelFormat::L8);
            for (dst, px) in out.data_mut().iter_mut().zip(src.data().chunks_exact(4)) {
                let mut straight = [px[0], px[1], px[2], px[3]];
                if from == PixelFormat::Rgba8Premul {
                    unpremultiply_rgba8_in_place(&mut straight);
                }
                *dst = luma(&straight);
            }
            out
        }
        (PixelFormat::L8, _) => {
            let mut out = pool.acquire(w, h, to);
            for (dst, &y) in out.data_mut().chunks_exact_mut(4).zip(src.data()) {
                dst.copy_from_slice(&[y, y, y, 255]);
            }
            out
        }
        _ => return Ok(None),
    };
    Ok(Some(out))
}

/// Converts the decoded bitmap to the request's preferred pixel format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixelFormatDecodeInterceptor;

impl DecodeInterceptor for PixelFormatDecodeInterceptor {
    fn name(&self) -> &str {
        "pixel_format"
    }

    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        let ctx = chain.context();
        let Some(to) = ctx.request().pixel_format() else {
            return chain.proceed();
        };
        chain.proceed()?.replace_bitmap(ctx.pool(), |raster| {
            Ok(convert(ctx.pool(), raster, to)?.map(|out| (out, None)))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/pixel_format.rs"]
mod tests;
