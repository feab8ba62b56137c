pub mod decoder;
pub mod format;
pub mod gif;
pub mod interceptor;
pub mod pixel_format;
pub mod resize;
pub mod result_cache;
pub mod sampling;
pub mod static_decoder;
