use crate::foundation::error::LoomResult;
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;
use crate::transform::{TransformOutput, Transformation};

/// Clockwise rotation by whole degrees.
///
/// Multiples of 90 are exact pixel permutations. Other angles grow the canvas to the rotated
/// bounding box and sample nearest-neighbour; uncovered pixels are transparent (zero).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RotateTransformation {
    degrees: i32,
}

impl RotateTransformation {
    /// Rotation by `degrees` clockwise. Any integer is accepted and normalized to `0..360`.
    pub fn new(degrees: i32) -> Self {
        Self {
            degrees: degrees.rem_euclid(360),
        }
    }

    /// Normalized angle.
    pub fn degrees(&self) -> i32 {
        self.degrees
    }
}

impl Transformation for RotateTransformation {
    fn key(&self) -> String {
        format!("RotateTransformation({})", self.degrees)
    }

    fn transform(&self, pool: &BufferPool, input: &Raster) -> LoomResult<Option<TransformOutput>> {
        let out = match self.degrees {
            0 => return Ok(None),
            90 | 180 | 270 => rotate_quarter(pool, input, self.degrees),
            d => rotate_any(pool, input, d),
        };
        Ok(Some(TransformOutput {
            raster: out,
            transformed: format!("RotateTransformed({})", self.degrees),
        }))
    }
}

fn rotate_quarter(pool: &BufferPool, src: &Raster, degrees: i32) -> Raster {
    let (w, h) = (src.width(), src.height());
    let bpp = src.format().bytes_per_pixel();
    let (dw, dh) = if degrees == 180 { (w, h) } else { (h, w) };
    let mut dst = pool.acquire(dw, dh, src.format());
    let stride = dw as usize * bpp;
    let data = dst.data_mut();
    for y in 0..dh {
        for x in 0..dw {
            let (sx, sy) = match degrees {
                90 => (y, h - 1 - x),
                180 => (w - 1 - x, h - 1 - y),
                _ => (w - 1 - y, x),
            };
            let at = y as usize * stride + x as usize * bpp;
            data[at..at + bpp].copy_from_slice(src.pixel(sx, sy));
        }
    }
    dst
}

fn rotate_any(pool: &BufferPool, src: &Raster, degrees: i32) -> Raster {
    let (w, h) = (f64::from(src.width()), f64::from(src.height()));
    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let dw = (w * cos.abs() + h * sin.abs()).round().max(1.0);
    let dh = (w * sin.abs() + h * cos.abs()).round().max(1.0);
    let bpp = src.format().bytes_per_pixel();

    let mut dst = pool.acquire(dw as u32, dh as u32, src.format());
    let stride = dw as usize * bpp;
    let data = dst.data_mut();
    for y in 0..dh as u32 {
        let dy = f64::from(y) + 0.5 - dh / 2.0;
        for x in 0..dw as u32 {
            let dx = f64::from(x) + 0.5 - dw / 2.0;
            let sx = (dx * cos + dy * sin + w / 2.0).floor();
            let sy = (-dx * sin + dy * cos + h / 2.0).floor();
            if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
                continue;
            }
            let at = y as usize * stride + x as usize * bpp;
            data[at..at + bpp].copy_from_slice(src.pixel(sx as u32, sy as u32));
        }
    }
    dst
}

#[cfg(test)]
#[path = "../../tests/unit/transform/rotate.rs"]
mod tests;
