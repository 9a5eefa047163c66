//! Peers Module
//!
//! Cluster membership, key ownership and the client side of the peer RPC.
//!
//! - [`PeerPicker`] follows a [`Discovery`] feed and answers which node owns a key.
//! - [`HttpPeerClient`] fetches a key from the owning node's cache group.
//! - [`MemoryRegistry`] and [`StaticDiscovery`] are the bundled discovery backends.

mod client;
mod discovery;
mod picker;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::CacheValue;
use crate::error::Result;

pub use client::HttpPeerClient;
pub use discovery::{Discovery, Lease, LeaseId, Membership, MemoryRegistry, StaticDiscovery};
pub use picker::{ClientFactory, Pick, PeerPicker};

/// Network identity of a node, its `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for PeerId {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

impl From<std::net::SocketAddr> for PeerId {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

/// Fetches values from one remote node.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// The node this getter talks to.
    fn peer(&self) -> &PeerId;

    /// Asks the remote node for `key` in cache group `group`.
    async fn get(&self, group: &str, key: &str) -> Result<CacheValue>;
}
