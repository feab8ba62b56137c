use image::imageops::FilterType;

use crate::decode::decoder::DecodeResult;
use crate::decode::interceptor::{DecodeChain, DecodeInterceptor};
use crate::foundation::core::{PixelFormat, Precision, Resize, Size};
use crate::foundation::error::LoomResult;
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;

/// Crop rectangle and output size that satisfy a [`Resize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizePlan {
    /// `(x, y, width, height)` to keep, or `None` for the whole image.
    pub crop: Option<(u32, u32, u32, u32)>,
    /// Final size.
    pub output: Size,
}

/// Largest centered rectangle of `src` with the aspect ratio of `target`.
fn center_crop(src: Size, target: Size) -> (u32, u32, u32, u32) {
    let (sw, sh) = (u64::from(src.width), u64::from(src.height));
    let (tw, th) = (u64::from(target.width), u64::from(target.height));
    if sw * th > tw * sh {
        let w = ((sh * tw + th / 2) / th).clamp(1, sw) as u32;
        ((src.width - w) / 2, 0, w, src.height)
    } else {
        let h = ((sw * th + tw / 2) / tw).clamp(1, sh) as u32;
        (0, (src.height - h) / 2, src.width, h)
    }
}

/// What to do to `src` for `resize`, or `None` when it already complies.
pub fn plan(src: Size, resize: Resize) -> Option<ResizePlan> {
    let target = resize.size;
    if src.is_empty() || target.is_empty() {
        return None;
    }
    match resize.precision {
        Precision::LessPixels => {
            if src.pixels() <= target.pixels() {
                return None;
            }
            let scale = (target.pixels() as f64 / src.pixels() as f64).sqrt();
            let output = Size::new(
                ((f64::from(src.width) * scale).floor() as u32).max(1),
                ((f64::from(src.height) * scale).floor() as u32).max(1),
            );
            Some(ResizePlan { crop: None, output })
        }
        Precision::SameAspectRatio | Precision::Exactly => {
            let (x, y, w, h) = center_crop(src, target);
            let cropped = Size::new(w, h);
            let output = if resize.precision == Precision::Exactly
                || cropped.pixels() > target.pixels()
            {
                target
            } else {
                cropped
            };
            let crop = (cropped != src).then_some((x, y, w, h));
            if crop.is_none() && output == src {
                return None;
            }
            Some(ResizePlan { crop, output })
        }
    }
}

/// Apply `plan` to `src`, producing a pooled raster of the same format.
pub fn apply_plan(pool: &BufferPool, src: &Raster, plan: ResizePlan) -> LoomResult<Raster> {
    let mut img = src.to_dynamic_image()?;
    if let Some((x, y, w, h)) = plan.crop {
        img = img.crop_imm(x, y, w, h);
    }
    if (img.width(), img.height()) != (plan.output.width, plan.output.height) {
        img = img.resize_exact(plan.output.width, plan.output.height, FilterType::Triangle);
    }
    let (w, h) = (img.width(), img.height());
    match src.format() {
        PixelFormat::Rgba8 | PixelFormat::Rgba8Premul => {
            pool.acquire_copy(w, h, src.format(), img.to_rgba8().as_raw())
        }
        PixelFormat::L8 => pool.acquire_copy(w, h, src.format(), img.to_luma8().as_raw()),
    }
}

/// Enforces the request's resize precision on the decoded bitmap.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResizeDecodeInterceptor;

impl DecodeInterceptor for ResizeDecodeInterceptor {
    fn name(&self) -> &str {
        "resize"
    }

    fn intercept(&self, chain: DecodeChain<'_>) -> LoomResult<DecodeResult> {
        let ctx = chain.context();
        let Some(resize) = ctx.request().resize() else {
            return chain.proceed();
        };
        let result = chain.proceed()?;
        result.replace_bitmap(ctx.pool(), |raster| {
            let Some(p) = plan(raster.size(), resize) else {
                return Ok(None);
            };
            let out = apply_plan(ctx.pool(), raster, p)?;
            Ok(Some((out, Some(format!("ResizeTransformed({})", resize.key())))))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/resize.rs"]
mod tests;
