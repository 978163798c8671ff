//! Cache Tiers
//!
//! In-memory tiers (FIFO and LRU flavors) and the on-disk bytecode tier.
//! Each tier owns its own lock; the orchestrator composes them but never
//! holds two tier locks at once.

pub mod disk;
pub mod memory;

pub use disk::DiskCache;
pub use memory::{BoundedCache, Displaced, LruCache};
