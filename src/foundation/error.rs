/// Convenience result type used across imageloom.
pub type LoomResult<T> = Result<T, LoomError>;

/// Top-level error taxonomy raised by the pipeline.
///
/// Lower layers raise these conditions; the request executor turns them into an
/// [`ImageResult`](crate::ImageResult) so nothing escapes the pipeline boundary untagged.
#[derive(thiserror::Error, Debug)]
pub enum LoomError {
    /// No fetcher factory matched the request identifier.
    #[error("unsupported identifier: {0}")]
    UnsupportedIdentifier(String),

    /// The byte source could not be opened or read.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A disk cache editor could not be obtained. Callers degrade to direct streaming.
    #[error("disk cache unusable: {0}")]
    CacheUnusable(String),

    /// The decoder rejected the bytes or produced invalid output.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// A transformation raised. The transformation stage skips it and keeps the prior buffer.
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// The request lifecycle was cancelled. Not a failure outcome.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid request or configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable, data-free tag for a [`LoomError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`LoomError::UnsupportedIdentifier`].
    UnsupportedIdentifier,
    /// See [`LoomError::SourceUnavailable`].
    SourceUnavailable,
    /// See [`LoomError::CacheUnusable`].
    CacheUnusable,
    /// See [`LoomError::DecodeFailed`].
    DecodeFailed,
    /// See [`LoomError::TransformFailed`].
    TransformFailed,
    /// See [`LoomError::Cancelled`].
    Cancelled,
    /// See [`LoomError::Validation`].
    Validation,
    /// See [`LoomError::Other`].
    Other,
}

impl LoomError {
    /// Build a [`LoomError::UnsupportedIdentifier`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedIdentifier(msg.into())
    }

    /// Build a [`LoomError::SourceUnavailable`] value.
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Build a [`LoomError::CacheUnusable`] value.
    pub fn cache_unusable(msg: impl Into<String>) -> Self {
        Self::CacheUnusable(msg.into())
    }

    /// Build a [`LoomError::DecodeFailed`] value.
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Build a [`LoomError::TransformFailed`] value.
    pub fn transform_failed(msg: impl Into<String>) -> Self {
        Self::TransformFailed(msg.into())
    }

    /// Build a [`LoomError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedIdentifier(_) => ErrorKind::UnsupportedIdentifier,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::CacheUnusable(_) => ErrorKind::CacheUnusable,
            Self::DecodeFailed(_) => ErrorKind::DecodeFailed,
            Self::TransformFailed(_) => ErrorKind::TransformFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// `true` for [`LoomError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
