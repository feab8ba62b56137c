use std::sync::Arc;

use crate::decode::decoder::{DecodeResult, DecodedImage};
use crate::foundation::core::{DataFrom, ImageInfo};
use crate::foundation::error::{ErrorKind, LoomError};
use crate::raster::buffer::Raster;
use crate::request::model::ImageRequest;

/// Delivered result of a successful pipeline run.
///
/// Cheap to clone; the decoded image is shared.
#[derive(Clone, Debug)]
pub struct ImageData {
    /// Decoded image.
    pub image: Arc<DecodedImage>,
    /// Declared properties of the source.
    pub info: ImageInfo,
    /// Tier the result was served from.
    pub data_from: DataFrom,
    /// Provenance tags in application order.
    pub transformed: Vec<String>,
    /// Cache key the result was produced for.
    pub cache_key: String,
}

impl ImageData {
    /// Wrap a finished decode result.
    pub fn from_decode(result: DecodeResult, cache_key: impl Into<String>) -> Self {
        Self {
            image: Arc::new(result.image),
            info: result.info,
            data_from: result.data_from,
            transformed: result.transformed,
            cache_key: cache_key.into(),
        }
    }

    /// The raster, for still images.
    pub fn bitmap(&self) -> Option<&Raster> {
        match &*self.image {
            DecodedImage::Bitmap(r) => Some(r),
            DecodedImage::Animated(_) => None,
        }
    }

    /// Bytes held by the image.
    pub fn byte_count(&self) -> usize {
        self.image.byte_count()
    }

    /// Same data, reported as served from `data_from`.
    pub fn with_data_from(mut self, data_from: DataFrom) -> Self {
        self.data_from = data_from;
        self
    }
}

/// Outcome of one request.
#[derive(Debug)]
pub enum ImageResult {
    /// The pipeline produced a result.
    Success {
        /// Request as it entered the pipeline.
        request: ImageRequest,
        /// Delivered data.
        data: ImageData,
    },
    /// The pipeline failed with a tagged error.
    Error {
        /// Request as it entered the pipeline.
        request: ImageRequest,
        /// Tagged failure.
        error: LoomError,
    },
    /// The lifecycle was cancelled. Not a failure.
    Cancelled {
        /// Request as it entered the pipeline.
        request: ImageRequest,
    },
}

impl ImageResult {
    /// Request this result answers.
    pub fn request(&self) -> &ImageRequest {
        match self {
            Self::Success { request, .. }
            | Self::Error { request, .. }
            | Self::Cancelled { request } => request,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Delivered data, on success.
    pub fn data(&self) -> Option<&ImageData> {
        match self {
            Self::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Failure, on error.
    pub fn error(&self) -> Option<&LoomError> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Failure tag, on error.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(LoomError::kind)
    }
}
