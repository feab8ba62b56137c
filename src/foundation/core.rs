use std::fmt;

use crate::foundation::error::{LoomError, LoomResult};

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Construct a size. Zero dimensions are allowed here; requests validate them.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width times height, saturating.
    pub fn pixels(self) -> u64 {
        u64::from(self.width).saturating_mul(u64::from(self.height))
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raster pixel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// Straight-alpha RGBA, 8 bits per channel.
    Rgba8,
    /// Premultiplied RGBA, 8 bits per channel.
    Rgba8Premul,
    /// Single-channel luma, 8 bits.
    L8,
}

impl PixelFormat {
    /// Storage bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Rgba8Premul => 4,
            Self::L8 => 1,
        }
    }

    /// `true` when a buffer laid out as `self` can hold `other` without loss.
    ///
    /// Pooled storage is overwritten on reuse, so only the container width matters.
    pub fn storage_compatible(self, other: PixelFormat) -> bool {
        self.bytes_per_pixel() == other.bytes_per_pixel()
    }

    /// `true` for formats that carry an alpha channel.
    pub fn has_alpha(self) -> bool {
        !matches!(self, Self::L8)
    }
}

/// How strictly the decoded result must match a [`Resize`] target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Precision {
    /// Pixel count must not exceed the target's; aspect ratio is kept.
    LessPixels,
    /// Aspect ratio must equal the target's; pixel count must not exceed it.
    SameAspectRatio,
    /// Output must be exactly the target size.
    Exactly,
}

impl Precision {
    /// Stable text used in cache keys and provenance tags.
    pub fn as_key(self) -> &'static str {
        match self {
            Self::LessPixels => "LESS_PIXELS",
            Self::SameAspectRatio => "SAME_ASPECT_RATIO",
            Self::Exactly => "EXACTLY",
        }
    }
}

/// Target size plus precision for a decoded result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resize {
    /// Target dimensions.
    pub size: Size,
    /// Matching precision.
    pub precision: Precision,
}

impl Resize {
    /// Build a resize target; both dimensions must be non-zero.
    pub fn new(width: u32, height: u32, precision: Precision) -> LoomResult<Self> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(LoomError::validation("resize width and height must be > 0"));
        }
        Ok(Self { size, precision })
    }

    /// Stable text used in cache keys.
    pub fn key(&self) -> String {
        format!("{},{}", self.size, self.precision.as_key())
    }
}

/// Read/write switches for one cache tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CachePolicy {
    /// Read and write.
    #[default]
    Enabled,
    /// Read only.
    ReadOnly,
    /// Write only.
    WriteOnly,
    /// Neither.
    Disabled,
}

impl CachePolicy {
    /// Whether lookups are allowed.
    pub fn read_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::ReadOnly)
    }

    /// Whether stores are allowed.
    pub fn write_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::WriteOnly)
    }

    /// Whether the tier takes part at all.
    pub fn read_or_write(self) -> bool {
        self.read_enabled() || self.write_enabled()
    }
}

/// Where the bytes (or the finished result) came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataFrom {
    /// Local filesystem, asset directory or content provider.
    Local,
    /// In-memory blob (data URI, packaged resource).
    Memory,
    /// Materialized source bytes in the data disk cache.
    DiskCache,
    /// Decoded result read back from the result disk cache.
    ResultCache,
    /// Delivered result served from the memory cache.
    MemoryCache,
    /// Remote origin (custom fetchers).
    Network,
}

/// Declared properties of the source image, before sampling or transformation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageInfo {
    /// Declared width in pixels.
    pub width: u32,
    /// Declared height in pixels.
    pub height: u32,
    /// Mime type, when known.
    pub mime_type: Option<String>,
}

impl ImageInfo {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
