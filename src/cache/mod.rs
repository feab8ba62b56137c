pub mod disk;
pub mod keyed_lock;
pub mod memory;
