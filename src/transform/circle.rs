use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;
use crate::transform::{TransformOutput, Transformation};

/// Center square crop with everything outside the inscribed circle cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CircleCropTransformation;

impl CircleCropTransformation {
    pub fn new() -> Self {
        Self
    }
}

impl Transformation for CircleCropTransformation {
    fn key(&self) -> String {
        "CircleCropTransformation".to_string()
    }

    fn transform(&self, pool: &BufferPool, input: &Raster) -> LoomResult<Option<TransformOutput>> {
        if input.width() == 0 || input.height() == 0 {
            return Ok(None);
        }
        if !input.format().has_alpha() {
            return Err(LoomError::transform_failed(format!(
                "circle crop needs an alpha channel, got {:?}",
                input.format()
            )));
        }
        let side = input.width().min(input.height());
        let left = (input.width() - side) / 2;
        let top = (input.height() - side) / 2;
        let bpp = input.format().bytes_per_pixel();

        let mut out = pool.acquire(side, side, input.format());
        let stride = out.stride();
        let r = f64::from(side) / 2.0;
        let data = out.data_mut();
        for y in 0..side {
            let dy = f64::from(y) + 0.5 - r;
            for x in 0..side {
                let dx = f64::from(x) + 0.5 - r;
                if dx.hypot(dy) > r {
                    continue;
                }
                let at = y as usize * stride + x as usize * bpp;
                data[at..at + bpp].copy_from_slice(input.pixel(left + x, top + y));
            }
        }

        Ok(Some(TransformOutput {
            raster: out,
            transformed: "CircleCropTransformed".to_string(),
        }))
    }
}
