use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder};

use crate::decode::decoder::{
    AnimatedFrame, AnimatedImage, DecodeResult, DecodedImage, Decoder, DecoderFactory,
};
use crate::decode::format::ImageFormat;
use crate::decode::interceptor::DecodeContext;
use crate::fetch::registry::FetchResult;
use crate::foundation::core::{ImageInfo, PixelFormat};
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::Raster;
use crate::source::data_source::SharedDataSource;

/// Animated GIF decoder. Declines when the request disallows animation, leaving the static
/// decoder to take the first frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct GifDecoderFactory;

impl DecoderFactory for GifDecoderFactory {
    fn name(&self) -> &str {
        "gif"
    }

    fn try_create(
        &self,
        ctx: &DecodeContext,
        fetch: &FetchResult,
        format: Option<ImageFormat>,
    ) -> Option<Box<dyn Decoder>> {
        if format != Some(ImageFormat::Gif) || ctx.request().disallow_animated() {
            return None;
        }
        Some(Box::new(GifAnimatedDecoder {
            source: fetch.data_source.clone(),
        }))
    }
}

struct GifAnimatedDecoder {
    source: SharedDataSource,
}

impl GifAnimatedDecoder {
    fn frames(&self, ctx: &DecodeContext, bytes: &[u8]) -> LoomResult<(u32, u32, Vec<AnimatedFrame>)> {
        let uri = self.source.uri();
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .map_err(|e| LoomError::decode_failed(format!("'{uri}': {e}")))?;
        let (w, h) = decoder.dimensions();
        let decoded = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| LoomError::decode_failed(format!("'{uri}': {e}")))?;

        let mut frames = Vec::with_capacity(decoded.len());
        for frame in decoded {
            if let Err(e) = ctx.request().lifecycle().check() {
                release_frames(ctx, frames);
                return Err(e);
            }
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom == 0 { 0 } else { numer / denom };
            let buf = frame.into_buffer();
            if buf.dimensions() != (w, h) {
                release_frames(ctx, frames);
                return Err(LoomError::decode_failed(format!(
                    "'{uri}': declared {w}x{h} but frame is {}x{}",
                    buf.width(),
                    buf.height()
                )));
            }
            let raster = if ctx.request().disable_buffer_pool() {
                Raster::from_vec(w, h, PixelFormat::Rgba8, buf.into_raw())?
            } else {
                ctx.pool().acquire_copy(w, h, PixelFormat::Rgba8, buf.as_raw())?
            };
            frames.push(AnimatedFrame { raster, delay_ms });
        }
        Ok((w, h, frames))
    }
}

fn release_frames(ctx: &DecodeContext, frames: Vec<AnimatedFrame>) {
    for f in frames {
        ctx.pool().recycle(f.raster, "gif decode aborted");
    }
}

impl Decoder for GifAnimatedDecoder {
    fn decode(self: Box<Self>, ctx: &DecodeContext) -> LoomResult<DecodeResult> {
        let bytes = self.source.read_all()?;
        ctx.request().lifecycle().check()?;
        let (w, h, mut frames) = self.frames(ctx, &bytes)?;

        let image = match frames.len() {
            0 => {
                return Err(LoomError::decode_failed(format!(
                    "'{}': gif has no frames",
                    self.source.uri()
                )));
            }
            1 => DecodedImage::Bitmap(frames.remove(0).raster),
            _ => DecodedImage::Animated(AnimatedImage { frames }),
        };
        Ok(DecodeResult {
            image,
            info: ImageInfo {
                width: w,
                height: h,
                mime_type: Some(ImageFormat::Gif.mime_type().to_string()),
            },
            data_from: self.source.data_from(),
            transformed: Vec::new(),
            sample_size: 1,
        })
    }
}
