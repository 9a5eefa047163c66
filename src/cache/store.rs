//! Local Store Module
//!
//! Byte-bounded key-value store with strict LRU eviction.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::cache::{CacheEntry, CacheValue, LruTracker, StoreStats};

// == Local Store ==
/// A bounded map from key to value, safe to share between tasks.
///
/// All operations run under one short-lived lock; nothing inside the lock
/// awaits or performs I/O. The sum of entry sizes never exceeds `capacity`
/// once an operation returns. A capacity of 0 disables the bound.
#[derive(Debug)]
pub struct LocalStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: StoreStats,
    total_bytes: usize,
}

impl LocalStore {
    // == Constructor ==
    /// Creates an empty store holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Get ==
    /// Looks up a key, refreshing its recency on a hit.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let mut inner = self.inner.lock();
        let value = inner.entries.get(key).map(|entry| entry.value.clone());
        match value {
            Some(value) => {
                inner.lru.touch(key);
                inner.stats.record_hit();
                Some(value)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Inserts or overwrites a key and marks it most recently used.
    ///
    /// Least recently used entries are evicted until the store fits its
    /// capacity again. A value larger than the whole capacity ends up
    /// evicting itself and is not kept.
    pub fn set(&self, key: &str, value: CacheValue) {
        let mut inner = self.inner.lock();
        inner.insert(key, value, self.capacity);
    }

    // == Set If Absent ==
    /// Inserts `value` only when `key` is not cached. Returns whether it was
    /// inserted. An existing entry is left untouched, recency included.
    pub fn set_if_absent(&self, key: &str, value: CacheValue) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(key) {
            return false;
        }
        inner.insert(key, value, self.capacity);
        true
    }

    // == Remove Oldest ==
    /// Evicts the least recently used entry, returning its key.
    pub fn remove_oldest(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let evicted = inner.remove_oldest();
        inner.sync_occupancy();
        evicted
    }

    // == Remove ==
    /// Drops a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = match inner.entries.remove(key) {
            Some(entry) => {
                inner.total_bytes -= entry.size;
                inner.lru.remove(key);
                true
            }
            None => false,
        };
        inner.sync_occupancy();
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> StoreStats {
        self.inner.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}

impl StoreInner {
    fn insert(&mut self, key: &str, value: CacheValue, capacity: usize) {
        let entry = CacheEntry::new(value);
        let added = entry.size;

        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.total_bytes -= old.size;
        }
        self.total_bytes += added;
        self.lru.touch(key);

        if capacity > 0 {
            while self.total_bytes > capacity {
                if self.remove_oldest().is_none() {
                    break;
                }
            }
        }
        self.sync_occupancy();
    }

    fn remove_oldest(&mut self) -> Option<String> {
        let key = self.lru.evict_oldest()?;
        if let Some(entry) = self.entries.remove(&key) {
            self.total_bytes -= entry.size;
        }
        self.stats.record_eviction();
        trace!(key = %key, "evicted least recently used entry");
        Some(key)
    }

    fn sync_occupancy(&mut self) {
        let (count, bytes) = (self.entries.len(), self.total_bytes);
        self.stats.set_occupancy(count, bytes);
    }
}
