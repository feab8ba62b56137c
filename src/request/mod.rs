pub mod context;
pub mod engine;
pub mod interceptor;
pub mod memory_cache;
pub mod model;
pub mod result;
pub mod validate;
