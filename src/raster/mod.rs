/// Owned raster buffers and pixel helpers.
pub mod buffer;
/// Reusable raster storage.
pub mod pool;
