pub mod fetchers;
pub mod registry;
