//! Concrete cache tiers.
//!
//! - [`MemoryLayer`]: bounded in-process LRU with optional entry TTL
//! - [`ShardedLayer`]: unbounded concurrent map, no eviction
//! - [`DirectoryLayer`]: persistent files on disk, one per key

mod directory;
mod memory;
mod sharded;

pub use directory::DirectoryLayer;
pub use memory::MemoryLayer;
pub use sharded::ShardedLayer;
