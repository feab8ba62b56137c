use std::io::Cursor;

use image::ImageDecoder;
use image::imageops::FilterType;
use image::metadata::Orientation;

use crate::decode::decoder::{DecodeResult, DecodedImage, Decoder, DecoderFactory};
use crate::decode::format::ImageFormat;
use crate::decode::interceptor::DecodeContext;
use crate::decode::sampling::{calculate_sample_size, sampled_size};
use crate::fetch::registry::FetchResult;
use crate::foundation::core::{ImageInfo, PixelFormat, Size};
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::Raster;
use crate::source::data_source::SharedDataSource;

/// Single-frame decoder for every format the `image` crate reads.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticDecoderFactory;

impl DecoderFactory for StaticDecoderFactory {
    fn name(&self) -> &str {
        "static"
    }

    fn try_create(
        &self,
        _ctx: &DecodeContext,
        fetch: &FetchResult,
        format: Option<ImageFormat>,
    ) -> Option<Box<dyn Decoder>> {
        if let Some(f) = format
            && f.to_codec().is_none()
        {
            return None;
        }
        Some(Box::new(StaticDecoder {
            source: fetch.data_source.clone(),
            mime_type: fetch.mime_type.clone(),
            format,
        }))
    }
}

struct StaticDecoder {
    source: SharedDataSource,
    mime_type: Option<String>,
    format: Option<ImageFormat>,
}

fn decode_err(uri: &str, e: impl std::fmt::Display) -> LoomError {
    LoomError::decode_failed(format!("'{uri}': {e}"))
}

impl Decoder for StaticDecoder {
    #[tracing::instrument(level = "debug", name = "static_decode", skip_all, fields(uri = self.source.uri()))]
    fn decode(self: Box<Self>, ctx: &DecodeContext) -> LoomResult<DecodeResult> {
        let request = ctx.request();
        let uri = self.source.uri();
        let bytes = self.source.read_all()?;
        request.lifecycle().check()?;

        let mut reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| decode_err(uri, e))?;
        if reader.format().is_none()
            && let Some(codec) = self.format.and_then(ImageFormat::to_codec)
        {
            reader.set_format(codec);
        }
        let format = reader.format().and_then(ImageFormat::from_codec).or(self.format);

        let mut decoder = reader.into_decoder().map_err(|e| decode_err(uri, e))?;
        let (declared_w, declared_h) = decoder.dimensions();
        if declared_w == 0 || declared_h == 0 {
            return Err(decode_err(uri, "declared size is empty"));
        }
        let orientation = if request.ignore_exif_orientation() {
            Orientation::NoTransforms
        } else {
            decoder.orientation().unwrap_or(Orientation::NoTransforms)
        };
        let mut img = image::DynamicImage::from_decoder(decoder).map_err(|e| decode_err(uri, e))?;
        if (img.width(), img.height()) != (declared_w, declared_h) {
            return Err(decode_err(
                uri,
                format!(
                    "declared {declared_w}x{declared_h} but decoded {}x{}",
                    img.width(),
                    img.height()
                ),
            ));
        }
        request.lifecycle().check()?;

        let info = ImageInfo {
            width: declared_w,
            height: declared_h,
            mime_type: format
                .map(|f| f.mime_type().to_string())
                .or(self.mime_type.clone()),
        };
        let mut transformed = Vec::new();
        if orientation != Orientation::NoTransforms {
            img.apply_orientation(orientation);
            transformed.push(format!("ExifOrientationTransformed({})", orientation.to_exif()));
        }

        let target = request.resize().map(|r| r.size).or(request.max_size());
        let oriented = Size::new(img.width(), img.height());
        let sample_size = calculate_sample_size(oriented, target, ctx.max_bitmap_size(), format);
        if sample_size > 1 {
            let n = sampled_size(oriented, sample_size, format);
            img = img.resize_exact(n.width, n.height, FilterType::Triangle);
            transformed.push(format!("InSampledTransformed({sample_size})"));
        }
        request.lifecycle().check()?;

        let rgba = img.into_rgba8();
        let (w, h) = rgba.dimensions();
        let raster = if request.disable_buffer_pool() {
            Raster::from_vec(w, h, PixelFormat::Rgba8, rgba.into_raw())?
        } else {
            ctx.pool().acquire_copy(w, h, PixelFormat::Rgba8, rgba.as_raw())?
        };
        tracing::debug!(width = w, height = h, sample_size, "decoded");

        Ok(DecodeResult {
            image: DecodedImage::Bitmap(raster),
            info,
            data_from: self.source.data_from(),
            transformed,
            sample_size,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/static_decoder.rs"]
mod tests;
