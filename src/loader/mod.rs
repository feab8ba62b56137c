pub mod components;
#[allow(clippy::module_inception)]
pub mod loader;
pub mod worker;
