//! Post-decode raster transformations.

use std::fmt;

use crate::foundation::error::LoomResult;
use crate::raster::buffer::Raster;
use crate::raster::pool::BufferPool;

pub mod circle;
pub mod interceptor;
pub mod rotate;
pub mod rounded;

pub use circle::CircleCropTransformation;
pub use rotate::RotateTransformation;
pub use rounded::RoundedCornersTransformation;

/// New raster produced by a transformation, plus its provenance tag.
#[derive(Debug)]
pub struct TransformOutput {
    /// Output raster. Owned by the caller from here on.
    pub raster: Raster,
    /// Stable tag appended to the result's provenance list.
    pub transformed: String,
}

/// One step of the post-decode fold.
///
/// Identity is the [`key`](Self::key): two independently built transformations with equal
/// configuration are interchangeable for caching.
pub trait Transformation: Send + Sync + fmt::Debug {
    /// Stable text describing the configuration. Feeds the cache key.
    fn key(&self) -> String;

    /// Produce a new raster from `input`, or `Ok(None)` to pass it through unchanged.
    ///
    /// Must not mutate or release `input`; the caller owns it. Output storage should come from
    /// `pool`.
    fn transform(&self, pool: &BufferPool, input: &Raster) -> LoomResult<Option<TransformOutput>>;
}

impl PartialEq for dyn Transformation {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for dyn Transformation {}
