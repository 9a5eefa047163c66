//! Cache Group Module
//!
//! A named cache that answers reads from its local store, from the peer
//! owning the key, or from its loader, and coalesces concurrent misses.

mod loader;
mod stats;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheValue, LocalStore, MAX_KEY_LENGTH};
use crate::coalescer::Coalescer;
use crate::error::{CacheError, Result};
use crate::peers::{PeerGetter, PeerPicker, Pick};

pub use loader::{LoadError, Loader, LoaderFn};
pub use stats::{GroupStats, GroupStatsSnapshot};

// == Group ==
pub struct Group {
    name: String,
    store: LocalStore,
    /// Routed loads: one per key, whatever the owner turns out to be
    flights: Coalescer<CacheValue>,
    /// Loader invocations: one per key, shared with requests from peers
    local_flights: Coalescer<CacheValue>,
    loader: Arc<dyn Loader>,
    peers: OnceLock<Arc<PeerPicker>>,
    stats: GroupStats,
    request_timeout: Option<Duration>,
    strict_routing: bool,
}

impl Group {
    // == Constructor ==
    /// Creates a group holding at most `cache_bytes` bytes (0 = unbounded).
    pub fn new(name: impl Into<String>, cache_bytes: usize, loader: impl Loader + 'static) -> Self {
        Self {
            name: name.into(),
            store: LocalStore::new(cache_bytes),
            flights: Coalescer::new(),
            local_flights: Coalescer::new(),
            loader: Arc::new(loader),
            peers: OnceLock::new(),
            stats: GroupStats::new(),
            request_timeout: None,
            strict_routing: false,
        }
    }

    /// Applies a deadline to every [`Group::get`].
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// When enabled, a key with no known owner fails with `NoOwner`
    /// instead of being loaded locally.
    pub fn with_strict_routing(mut self, strict: bool) -> Self {
        self.strict_routing = strict;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Register Peers ==
    /// Binds the peer picker. Allowed once, before traffic starts.
    pub fn register_peers(&self, picker: Arc<PeerPicker>) -> Result<()> {
        self.peers.set(picker).map_err(|_| {
            CacheError::Internal(format!("peers already registered for group {}", self.name))
        })
    }

    // == Get ==
    /// Returns the value for `key`, honoring the group's default deadline.
    pub async fn get(self: &Arc<Self>, key: &str) -> Result<CacheValue> {
        match self.request_timeout {
            Some(timeout) => self.get_with_timeout(key, timeout).await,
            None => self.lookup(key, true).await,
        }
    }

    /// Returns the value for `key`, giving up with `Cancelled` after `timeout`.
    ///
    /// Giving up only affects this caller; a load already started keeps
    /// running for everyone else waiting on it.
    pub async fn get_with_timeout(
        self: &Arc<Self>,
        key: &str,
        timeout: Duration,
    ) -> Result<CacheValue> {
        match tokio::time::timeout(timeout, self.lookup(key, true)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(group = %self.name, key = %key, "deadline expired while waiting");
                Err(CacheError::Cancelled(key.to_string()))
            }
        }
    }

    /// Serves a peer's request: local store, else this node's loader.
    /// Never forwards to another node.
    pub async fn load_local(self: &Arc<Self>, key: &str) -> Result<CacheValue> {
        self.lookup(key, false).await
    }

    // == Set ==
    /// Stores `value` in this node's local store, whoever owns the key.
    pub fn set(&self, key: &str, value: impl Into<CacheValue>) -> Result<()> {
        validate_key(key)?;
        self.store.set(key, value.into());
        Ok(())
    }

    // == Remove ==
    /// Drops `key` from this node's local store. Returns whether it was cached.
    pub fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.store.remove(key))
    }

    // == Stats ==
    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats.snapshot(self.store.stats())
    }

    async fn lookup(self: &Arc<Self>, key: &str, routed: bool) -> Result<CacheValue> {
        validate_key(key)?;

        if let Some(value) = self.store.get(key) {
            self.stats.record_hit();
            debug!(group = %self.name, key = %key, "cache hit");
            return Ok(value);
        }
        self.stats.record_miss();

        if !routed {
            return self.load_locally(key).await;
        }
        let group = Arc::clone(self);
        let owned = key.to_string();
        self.flights
            .run(key, async move { group.load(&owned).await })
            .await
    }

    async fn load(self: &Arc<Self>, key: &str) -> Result<CacheValue> {
        let pick = match self.peers.get() {
            Some(picker) => picker.pick(key),
            None => Pick::Unknown,
        };

        match pick {
            Pick::Remote(peer) => self.load_from_peer(peer.as_ref(), key).await,
            Pick::Unknown if self.strict_routing => {
                debug!(group = %self.name, key = %key, "no owner for key");
                Err(CacheError::NoOwner(key.to_string()))
            }
            Pick::Local | Pick::Unknown => self.load_locally(key).await,
        }
    }

    async fn load_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<CacheValue> {
        match peer.get(&self.name, key).await {
            Ok(value) => {
                self.stats.record_peer_load();
                self.keep_loaded(key, &value);
                debug!(group = %self.name, key = %key, peer = %peer.peer(), "loaded from peer");
                Ok(value)
            }
            Err(err) => {
                self.stats.record_peer_error();
                warn!(
                    group = %self.name,
                    key = %key,
                    peer = %peer.peer(),
                    error = %err,
                    "peer fetch failed"
                );
                Err(err)
            }
        }
    }

    fn load_locally(self: &Arc<Self>, key: &str) -> impl Future<Output = Result<CacheValue>> {
        let group = Arc::clone(self);
        let owned = key.to_string();
        self.local_flights
            .run(key, async move { group.run_loader(&owned).await })
    }

    async fn run_loader(&self, key: &str) -> Result<CacheValue> {
        self.stats.record_local_load();
        match self.loader.load(key).await {
            Ok(value) => {
                self.keep_loaded(key, &value);
                debug!(group = %self.name, key = %key, bytes = value.len(), "loaded locally");
                Ok(value)
            }
            Err(LoadError::NotFound) => Err(CacheError::NotFound(key.to_string())),
            Err(LoadError::Failed(reason)) => {
                self.stats.record_loader_error();
                warn!(group = %self.name, key = %key, error = %reason, "loader failed");
                Err(CacheError::LoaderFailed {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }

    /// Caches a loaded value unless a `set` for the key landed while the
    /// load was in flight. The written value wins.
    fn keep_loaded(&self, key: &str, value: &CacheValue) {
        if !self.store.set_if_absent(key, value.clone()) {
            debug!(group = %self.name, key = %key, "key written during load, kept written value");
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

// == Group Registry ==
/// Name -> group table consulted by the RPC server.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group. Names are unique.
    pub fn insert(&self, group: Group) -> Result<Arc<Group>> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(CacheError::InvalidRequest(format!(
                "group {} already exists",
                group.name()
            )));
        }
        let group = Arc::new(group);
        groups.insert(group.name().to_string(), Arc::clone(&group));
        Ok(group)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests;
