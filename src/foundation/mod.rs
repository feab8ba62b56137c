/// Loader configuration.
pub mod config;
/// Shared value types.
pub mod core;
pub(crate) mod digest;
/// Error taxonomy.
pub mod error;
/// Request cancellation.
pub mod lifecycle;
