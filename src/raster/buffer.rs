use crate::foundation::core::{PixelFormat, Size};
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::pool::SlotLease;

/// Slot index plus generation tag for a pooled buffer.
///
/// A handle is live from `acquire` until the buffer goes back through
/// [`BufferPool::release`](crate::BufferPool::release) or the raster is dropped; after that the
/// generation no longer matches and the pool rejects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// Owned raster buffer, row-major and tightly packed.
///
/// Not `Clone`: a raster has exactly one owner at a time (pool, in-flight stage, or delivered
/// result).
#[derive(Debug)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    lease: Option<SlotLease>,
}

impl Raster {
    /// Zero-filled raster that does not belong to any pool.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = byte_len(width, height, format);
        Self {
            width,
            height,
            format,
            data: vec![0; len],
            lease: None,
        }
    }

    /// Wrap existing pixel bytes. The length must match the dimensions exactly.
    pub fn from_vec(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> LoomResult<Self> {
        let expected = byte_len(width, height, format);
        if data.len() != expected {
            return Err(LoomError::validation(format!(
                "raster {width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            lease: None,
        })
    }

    pub(crate) fn from_pool(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        lease: Option<SlotLease>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            data,
            lease,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Pool handle, when the storage is tracked by a pool.
    pub fn handle(&self) -> Option<BufferHandle> {
        self.lease.as_ref().map(|l| l.handle)
    }

    /// `true` when the storage came from a pool.
    pub fn is_pooled(&self) -> bool {
        self.lease.is_some()
    }

    /// Allocated bytes backing this raster.
    pub fn allocation_bytes(&self) -> usize {
        self.data.capacity()
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let at = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[at..at + bpp]
    }

    /// Relabel the pixel layout when the container width is unchanged.
    pub(crate) fn set_format(&mut self, format: PixelFormat) {
        debug_assert!(self.format.storage_compatible(format));
        self.format = format;
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, Option<BufferHandle>) {
        (self.data, self.lease.map(SlotLease::disarm))
    }

    /// Copy into an `image` buffer for resampling.
    pub(crate) fn to_dynamic_image(&self) -> LoomResult<image::DynamicImage> {
        let data = self.data.clone();
        let img = match self.format {
            PixelFormat::Rgba8 | PixelFormat::Rgba8Premul => {
                image::RgbaImage::from_raw(self.width, self.height, data)
                    .map(image::DynamicImage::ImageRgba8)
            }
            PixelFormat::L8 => image::GrayImage::from_raw(self.width, self.height, data)
                .map(image::DynamicImage::ImageLuma8),
        };
        img.ok_or_else(|| LoomError::validation("raster bytes do not match dimensions"))
    }
}

/// Byte length of a tightly packed raster.
pub fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(format.bytes_per_pixel())
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

/// Rec. 601 luma of an RGBA pixel, ignoring alpha.
pub(crate) fn luma(px: &[u8]) -> u8 {
    let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
    ((y + 500) / 1000) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/raster/buffer.rs"]
mod tests;
