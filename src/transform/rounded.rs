use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;
use crate::transform::{TransformOutput, Transformation};

/// Clears the pixels outside four quarter-circle corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoundedCornersTransformation {
    radius: u32,
}

impl RoundedCornersTransformation {
    /// Corners of `radius` pixels, clamped to half the shorter side at apply time.
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

impl Transformation for RoundedCornersTransformation {
    fn key(&self) -> String {
        format!("RoundedCornersTransformation({})", self.radius)
    }

    fn transform(&self, pool: &BufferPool, input: &Raster) -> LoomResult<Option<TransformOutput>> {
        if self.radius == 0 || input.width() == 0 || input.height() == 0 {
            return Ok(None);
        }
        if !input.format().has_alpha() {
            return Err(LoomError::transform_failed(format!(
                "rounded corners need an alpha channel, got {:?}",
                input.format()
            )));
        }
        let (w, h) = (input.width(), input.height());
        let r = f64::from(self.radius.min(w.min(h) / 2).max(1));
        let mut out = pool.acquire_copy(w, h, input.format(), input.data())?;
        let bpp = input.format().bytes_per_pixel();
        let stride = out.stride();
        let (fw, fh) = (f64::from(w), f64::from(h));
        let data = out.data_mut();

        for y in 0..h {
            let py = f64::from(y) + 0.5;
            let cy = if py < r {
                r
            } else if py > fh - r {
                fh - r
            } else {
                continue;
            };
            for x in 0..w {
                let px = f64::from(x) + 0.5;
                let cx = if px < r {
                    r
                } else if px > fw - r {
                    fw - r
                } else {
                    continue;
                };
                if (px - cx).hypot(py - cy) > r {
                    let at = y as usize * stride + x as usize * bpp;
                    data[at..at + bpp].fill(0);
                }
            }
        }

        Ok(Some(TransformOutput {
            raster: out,
            transformed: format!("RoundedCornersTransformed({})", self.radius),
        }))
    }
}
