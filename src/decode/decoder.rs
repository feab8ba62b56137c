use std::sync::Arc;

use crate::decode::format::{ImageFormat, SNIFF_LEN, is_generic_mime_type};
use crate::decode::interceptor::DecodeContext;
use crate::fetch::registry::FetchResult;
use crate::foundation::core::{DataFrom, ImageInfo, Size};
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;

/// One frame of an animated image.
#[derive(Debug)]
pub struct AnimatedFrame {
    /// Fully composited frame.
    pub raster: Raster,
    /// Display time in milliseconds.
    pub delay_ms: u32,
}

/// Decoded multi-frame image.
#[derive(Debug)]
pub struct AnimatedImage {
    /// Frames in display order. Never empty.
    pub frames: Vec<AnimatedFrame>,
}

impl AnimatedImage {
    /// Canvas size (the first frame's size).
    pub fn size(&self) -> Size {
        self.frames
            .first()
            .map(|f| f.raster.size())
            .unwrap_or(Size::new(0, 0))
    }

    /// Sum of frame delays.
    pub fn duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.delay_ms)).sum()
    }
}

/// Output of a decoder.
#[derive(Debug)]
pub enum DecodedImage {
    Bitmap(Raster),
    Animated(AnimatedImage),
}

impl DecodedImage {
    /// Displayed size.
    pub fn size(&self) -> Size {
        match self {
            Self::Bitmap(r) => r.size(),
            Self::Animated(a) => a.size(),
        }
    }

    /// Pixel bytes held.
    pub fn byte_count(&self) -> usize {
        match self {
            Self::Bitmap(r) => r.data().len(),
            Self::Animated(a) => a.frames.iter().map(|f| f.raster.data().len()).sum(),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(_))
    }

    /// Give every raster back to `pool`.
    pub(crate) fn release_into(self, pool: &BufferPool, reason: &str) {
        match self {
            Self::Bitmap(r) => pool.recycle(r, reason),
            Self::Animated(a) => {
                for frame in a.frames {
                    pool.recycle(frame.raster, reason);
                }
            }
        }
    }
}

/// Result flowing up the decode interceptor chain.
#[derive(Debug)]
pub struct DecodeResult {
    /// Decoded image; owned by this result until transformed or delivered.
    pub image: DecodedImage,
    /// Declared source properties.
    pub info: ImageInfo,
    /// Where the bytes came from.
    pub data_from: DataFrom,
    /// Provenance tags in application order.
    pub transformed: Vec<String>,
    /// Power-of-two sample size used by the decoder.
    pub sample_size: u32,
}

impl DecodeResult {
    /// The raster, for still images.
    pub fn bitmap(&self) -> Option<&Raster> {
        match &self.image {
            DecodedImage::Bitmap(r) => Some(r),
            DecodedImage::Animated(_) => None,
        }
    }

    /// Swap the bitmap for the one `f` builds from it, appending `f`'s tag.
    ///
    /// The replaced raster goes back to `pool` exactly once, also when `f` fails. `Ok(None)`
    /// keeps the bitmap; animated results pass through untouched.
    pub fn replace_bitmap<F>(self, pool: &BufferPool, f: F) -> LoomResult<Self>
    where
        F: FnOnce(&Raster) -> LoomResult<Option<(Raster, Option<String>)>>,
    {
        let Self {
            image,
            info,
            data_from,
            mut transformed,
            sample_size,
        } = self;
        let raster = match image {
            DecodedImage::Bitmap(r) => r,
            other => {
                return Ok(Self {
                    image: other,
                    info,
                    data_from,
                    transformed,
                    sample_size,
                });
            }
        };
        let image = match f(&raster) {
            Ok(Some((next, tag))) => {
                pool.recycle(raster, "bitmap replaced");
                transformed.extend(tag);
                next
            }
            Ok(None) => raster,
            Err(e) => {
                pool.recycle(raster, "bitmap stage failed");
                return Err(e);
            }
        };
        Ok(Self {
            image: DecodedImage::Bitmap(image),
            info,
            data_from,
            transformed,
            sample_size,
        })
    }
}

/// Decoder bound to one fetched source.
pub trait Decoder: Send {
    /// Decode. Runs on a worker thread.
    fn decode(self: Box<Self>, ctx: &DecodeContext) -> LoomResult<DecodeResult>;
}

/// Produces a decoder for fetched bytes it understands.
pub trait DecoderFactory: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Return a decoder, or `None` to let the next factory try.
    fn try_create(
        &self,
        ctx: &DecodeContext,
        fetch: &FetchResult,
        format: Option<ImageFormat>,
    ) -> Option<Box<dyn Decoder>>;
}

/// Ordered decoder factories; the first that accepts wins.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    factories: Vec<Arc<dyn DecoderFactory>>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|x| x.name()))
            .finish()
    }
}

impl DecoderRegistry {
    /// Registry over `factories`, in priority order.
    pub fn new(factories: Vec<Arc<dyn DecoderFactory>>) -> Self {
        Self { factories }
    }

    pub fn factories(&self) -> &[Arc<dyn DecoderFactory>] {
        &self.factories
    }

    /// Format of the fetched bytes: the declared mime type when it is specific and known,
    /// otherwise sniffed from the header.
    pub fn detect_format(fetch: &FetchResult) -> LoomResult<Option<ImageFormat>> {
        if let Some(mime) = fetch.mime_type.as_deref()
            && !is_generic_mime_type(mime)
            && let Some(format) = ImageFormat::from_mime_type(mime)
        {
            return Ok(Some(format));
        }
        let header = fetch.data_source.header(SNIFF_LEN)?;
        Ok(ImageFormat::sniff(&header))
    }

    /// Pick the decoder for `fetch`.
    pub fn resolve(&self, ctx: &DecodeContext, fetch: &FetchResult) -> LoomResult<Box<dyn Decoder>> {
        let format = Self::detect_format(fetch)?;
        for factory in &self.factories {
            if let Some(decoder) = factory.try_create(ctx, fetch, format) {
                tracing::debug!(factory = factory.name(), ?format, "decoder resolved");
                return Ok(decoder);
            }
        }
        Err(LoomError::decode_failed(format!(
            "no decoder for '{}' (declared {:?}, detected {:?})",
            fetch.data_source.uri(),
            fetch.mime_type,
            format
        )))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/decoder.rs"]
mod tests;
