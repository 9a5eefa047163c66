//! Cache Statistics Module
//!
//! Tracks local store metrics including hits, misses, evictions and size.

use serde::Serialize;

// == Store Stats ==
/// Counters kept by the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of lookups that found an entry
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Current number of entries
    pub entry_count: usize,
    /// Current number of bytes charged against capacity
    pub total_bytes: usize,
}

impl StoreStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Update Occupancy ==
    pub fn set_occupancy(&mut self, entry_count: usize, total_bytes: usize) {
        self.entry_count = entry_count;
        self.total_bytes = total_bytes;
    }
}
