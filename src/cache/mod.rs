//! Cache Module
//!
//! Provides the bounded local store each node keeps for its cache groups.

mod entry;
mod lru;
mod stats;
mod store;
mod value;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::StoreStats;
pub use store::LocalStore;
pub use value::CacheValue;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
