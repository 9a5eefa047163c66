//! Cache Entry Module
//!
//! Defines the structure for individual entries held by the local store.

use crate::cache::CacheValue;

// == Cache Entry ==
/// A stored value together with the number of bytes it is charged for.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: CacheValue,
    /// Bytes charged against the store capacity
    pub size: usize,
}

impl CacheEntry {
    /// Creates a new entry; its size is the length of the value.
    pub fn new(value: CacheValue) -> Self {
        let size = value.len();
        Self { value, size }
    }
}
