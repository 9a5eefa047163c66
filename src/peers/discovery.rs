//! Service discovery.
//!
//! A discovery backend keeps, per service name, the set of live node
//! addresses and publishes a full snapshot whenever that set changes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{CacheError, Result};
use crate::peers::PeerId;

/// Snapshot of the live members of one service.
pub type Membership = BTreeSet<PeerId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(pub u64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A registration handle. `ttl` is `None` when the registration never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub id: LeaseId,
    pub ttl: Option<Duration>,
}

/// Membership feed plus node registration.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Announces `peer` under `service`.
    async fn register(&self, service: &str, peer: &PeerId) -> Result<Lease>;

    /// Extends a lease. Fails with `NotFound` once the lease has expired.
    async fn keep_alive(&self, lease: LeaseId) -> Result<()>;

    /// Withdraws `peer` from `service`.
    async fn deregister(&self, service: &str, peer: &PeerId) -> Result<()>;

    /// Subscribes to membership snapshots of `service`.
    fn watch(&self, service: &str) -> watch::Receiver<Membership>;
}

// == Memory Registry ==
/// In-process registry with TTL leases.
///
/// Registrations disappear when their lease is not refreshed within the TTL
/// and [`MemoryRegistry::reap_expired`] runs.
pub struct MemoryRegistry {
    ttl: Duration,
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    services: HashMap<String, Service>,
    leases: HashMap<LeaseId, (String, PeerId)>,
    next_lease: u64,
}

struct Service {
    members: HashMap<PeerId, Registration>,
    feed: watch::Sender<Membership>,
}

struct Registration {
    lease: LeaseId,
    expires_at: Instant,
}

impl Service {
    fn new() -> Self {
        let (feed, _) = watch::channel(Membership::new());
        Self {
            members: HashMap::new(),
            feed,
        }
    }

    fn publish(&self) {
        let next: Membership = self.members.keys().cloned().collect();
        self.feed.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl RegistryState {
    fn service(&mut self, name: &str) -> &mut Service {
        self.services
            .entry(name.to_string())
            .or_insert_with(Service::new)
    }
}

impl MemoryRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current members of `service`.
    pub fn members(&self, service: &str) -> Membership {
        let state = self.state.lock();
        state
            .services
            .get(service)
            .map(|s| s.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    // == Reap Expired ==
    /// Drops every registration whose lease ran out. Returns how many were dropped.
    pub fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut reaped = 0;

        for (name, service) in state.services.iter_mut() {
            let expired: Vec<PeerId> = service
                .members
                .iter()
                .filter(|(_, reg)| reg.expires_at <= now)
                .map(|(peer, _)| peer.clone())
                .collect();
            if expired.is_empty() {
                continue;
            }
            for peer in expired {
                if let Some(reg) = service.members.remove(&peer) {
                    state.leases.remove(&reg.lease);
                    info!(service = %name, peer = %peer, "lease expired, peer removed");
                    reaped += 1;
                }
            }
            service.publish();
        }
        reaped
    }
}

#[async_trait]
impl Discovery for MemoryRegistry {
    async fn register(&self, service: &str, peer: &PeerId) -> Result<Lease> {
        let mut state = self.state.lock();
        let id = LeaseId(state.next_lease);
        state.next_lease += 1;

        let registration = Registration {
            lease: id,
            expires_at: Instant::now() + self.ttl,
        };
        let replaced = state.service(service).members.insert(peer.clone(), registration);
        if let Some(old) = replaced {
            state.leases.remove(&old.lease);
        }
        state.leases.insert(id, (service.to_string(), peer.clone()));
        state.service(service).publish();

        debug!(service = %service, peer = %peer, lease = %id, "registered");
        Ok(Lease {
            id,
            ttl: Some(self.ttl),
        })
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<()> {
        let mut state = self.state.lock();
        let (service, peer) = state
            .leases
            .get(&lease)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(format!("lease {}", lease)))?;

        let expires_at = Instant::now() + self.ttl;
        match state.service(&service).members.get_mut(&peer) {
            Some(reg) if reg.lease == lease => {
                reg.expires_at = expires_at;
                Ok(())
            }
            _ => Err(CacheError::NotFound(format!("lease {}", lease))),
        }
    }

    async fn deregister(&self, service: &str, peer: &PeerId) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reg) = state.service(service).members.remove(peer) {
            state.leases.remove(&reg.lease);
            state.service(service).publish();
            debug!(service = %service, peer = %peer, "deregistered");
        }
        Ok(())
    }

    fn watch(&self, service: &str) -> watch::Receiver<Membership> {
        self.state.lock().service(service).feed.subscribe()
    }
}

// == Static Discovery ==
/// Fixed membership taken from configuration.
///
/// There is a single service: the service name is ignored. Registering adds
/// the node to the set, so a node always sees itself even if it was left
/// out of the configured list.
pub struct StaticDiscovery {
    feed: watch::Sender<Membership>,
}

impl StaticDiscovery {
    pub fn new<I, P>(peers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerId>,
    {
        let members: Membership = peers.into_iter().map(Into::into).collect();
        let (feed, _) = watch::channel(members);
        Self { feed }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn register(&self, _service: &str, peer: &PeerId) -> Result<Lease> {
        self.feed.send_if_modified(|members| members.insert(peer.clone()));
        Ok(Lease {
            id: LeaseId(0),
            ttl: None,
        })
    }

    async fn keep_alive(&self, _lease: LeaseId) -> Result<()> {
        Ok(())
    }

    async fn deregister(&self, _service: &str, peer: &PeerId) -> Result<()> {
        self.feed.send_if_modified(|members| members.remove(peer));
        Ok(())
    }

    fn watch(&self, _service: &str) -> watch::Receiver<Membership> {
        self.feed.subscribe()
    }
}
