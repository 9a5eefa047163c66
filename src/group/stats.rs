//! Group Statistics Module
//!
//! Lock-free counters for the outcomes of group reads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::StoreStats;

// == Group Stats ==
/// Counters updated on every Get outcome. They only ever grow.
#[derive(Debug, Default)]
pub struct GroupStats {
    hits: AtomicU64,
    misses: AtomicU64,
    local_loads: AtomicU64,
    loader_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
}

/// Point-in-time copy of [`GroupStats`] plus the local store occupancy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStatsSnapshot {
    /// Gets answered from the local store
    pub hits: u64,
    /// Gets that had to load
    pub misses: u64,
    /// Loader invocations on this node
    pub local_loads: u64,
    /// Loader invocations that failed
    pub loader_errors: u64,
    /// Values fetched from the owning peer
    pub peer_loads: u64,
    /// Failed fetches from the owning peer
    pub peer_errors: u64,
    /// Local store counters
    pub store: StoreStats,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, store: StoreStats) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            store,
        }
    }
}

impl GroupStatsSnapshot {
    /// Returns hits / (hits + misses), or 0.0 before the first Get.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
