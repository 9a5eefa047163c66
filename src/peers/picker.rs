//! Peer picker.
//!
//! Follows the discovery feed, rebuilds the hash ring on every membership
//! change and resolves key ownership. Routing state is an immutable snapshot
//! swapped as a whole, so a concurrent `pick` sees either the old or the new
//! ring, never a half built one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::peers::discovery::Membership;
use crate::peers::{Discovery, HttpPeerClient, PeerGetter, PeerId};
use crate::ring::HashRing;

/// Creates the getter used to reach a newly discovered peer.
pub type ClientFactory = Arc<dyn Fn(&PeerId) -> Arc<dyn PeerGetter> + Send + Sync>;

/// Outcome of an ownership lookup.
#[derive(Clone)]
pub enum Pick {
    /// This node owns the key.
    Local,
    /// Another node owns the key.
    Remote(Arc<dyn PeerGetter>),
    /// No node is known yet.
    Unknown,
}

impl std::fmt::Debug for Pick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pick::Local => f.write_str("Local"),
            Pick::Remote(getter) => f.debug_tuple("Remote").field(getter.peer()).finish(),
            Pick::Unknown => f.write_str("Unknown"),
        }
    }
}

/// One consistent view of the cluster.
struct Routing {
    ring: HashRing,
    members: Membership,
    clients: HashMap<PeerId, Arc<dyn PeerGetter>>,
}

pub struct PeerPicker {
    self_id: PeerId,
    service: String,
    discovery: Arc<dyn Discovery>,
    factory: ClientFactory,
    routing: RwLock<Arc<Routing>>,
    /// Serializes rebuilds; readers never take it
    rebuild: Mutex<()>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl PeerPicker {
    /// Creates a picker that reaches peers over HTTP.
    pub fn new(
        self_id: PeerId,
        service: impl Into<String>,
        discovery: Arc<dyn Discovery>,
        replicas: usize,
        http_client: reqwest::Client,
    ) -> Arc<Self> {
        let factory: ClientFactory = Arc::new(move |peer: &PeerId| {
            let client = HttpPeerClient::new(peer.clone(), http_client.clone());
            Arc::new(client) as Arc<dyn PeerGetter>
        });
        Self::with_factory(self_id, service, discovery, HashRing::new(replicas), factory)
    }

    /// Creates a picker with a custom ring template and peer client factory.
    pub fn with_factory(
        self_id: PeerId,
        service: impl Into<String>,
        discovery: Arc<dyn Discovery>,
        ring: HashRing,
        factory: ClientFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            self_id,
            service: service.into(),
            discovery,
            factory,
            routing: RwLock::new(Arc::new(Routing {
                ring,
                members: Membership::new(),
                clients: HashMap::new(),
            })),
            rebuild: Mutex::new(()),
            watcher: Mutex::new(None),
        })
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    // == Start ==
    /// Applies the current membership and keeps following the discovery feed
    /// in a background task until [`PeerPicker::shutdown`].
    pub fn start(self: &Arc<Self>) {
        let mut feed = self.discovery.watch(&self.service);
        let initial = feed.borrow_and_update().clone();
        self.apply_membership(&initial);

        let picker = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let members = feed.borrow_and_update().clone();
                match picker.upgrade() {
                    Some(picker) => picker.apply_membership(&members),
                    None => break,
                }
            }
            debug!("membership feed closed");
        });

        if let Some(old) = self.watcher.lock().replace(handle) {
            old.abort();
        }
        info!(service = %self.service, node = %self.self_id, "peer picker started");
    }

    // == Shutdown ==
    /// Stops following the discovery feed. The last known ring stays usable.
    pub fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
            info!(service = %self.service, "peer picker stopped");
        }
    }

    // == Apply Membership ==
    /// Rebuilds the ring for `members` and swaps it in.
    pub fn apply_membership(&self, members: &Membership) {
        let _rebuild = self.rebuild.lock();
        let current = self.routing.read().clone();

        let clients: HashMap<PeerId, Arc<dyn PeerGetter>> = members
            .iter()
            .filter(|peer| **peer != self.self_id)
            .map(|peer| {
                let client = current
                    .clients
                    .get(peer)
                    .cloned()
                    .unwrap_or_else(|| (self.factory)(peer));
                (peer.clone(), client)
            })
            .collect();

        for peer in members.difference(&current.members) {
            info!(peer = %peer, "peer joined");
        }
        for peer in current.members.difference(members) {
            info!(peer = %peer, "peer left");
        }
        if !members.is_empty() && !members.contains(&self.self_id) {
            debug!(node = %self.self_id, "this node is not part of the membership");
        }

        let next = Arc::new(Routing {
            ring: current.ring.build(members),
            members: members.clone(),
            clients,
        });
        *self.routing.write() = next;
    }

    // == Pick ==
    /// Resolves the owner of `key`.
    pub fn pick(&self, key: &str) -> Pick {
        let routing = self.routing.read().clone();
        match routing.ring.locate(key) {
            None => Pick::Unknown,
            Some(owner) if *owner == self.self_id => Pick::Local,
            Some(owner) => match routing.clients.get(owner) {
                Some(client) => Pick::Remote(Arc::clone(client)),
                None => {
                    warn!(peer = %owner, key = %key, "ring owner has no client");
                    Pick::Unknown
                }
            },
        }
    }

    /// Peers currently on the ring, this node included.
    pub fn peers(&self) -> Vec<PeerId> {
        self.routing.read().members.iter().cloned().collect()
    }
}

impl Drop for PeerPicker {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.get_mut().take() {
            handle.abort();
        }
    }
}
