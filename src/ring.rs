//! Consistent hash ring.
//!
//! Every peer is placed on the ring at `replicas` virtual positions. A key
//! belongs to the first position at or after its own hash, wrapping around
//! to the smallest position.

use sha2::{Digest, Sha256};

use crate::peers::PeerId;

/// Hash function used to place keys and virtual nodes.
pub type RingHasher = fn(&[u8]) -> u64;

/// Default hash: the first eight bytes of SHA-256, identical on every node.
pub fn sha256_hash(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Immutable routing index. Rebuilt from scratch on every membership change.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    hasher: RingHasher,
    /// Sorted by hash
    positions: Vec<(u64, PeerId)>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, sha256_hash)
    }

    pub fn with_hasher(replicas: usize, hasher: RingHasher) -> Self {
        Self {
            replicas: replicas.max(1),
            hasher,
            positions: Vec::new(),
        }
    }

    /// Returns a new ring with the same settings holding exactly `peers`.
    pub fn build<'a, I>(&self, peers: I) -> Self
    where
        I: IntoIterator<Item = &'a PeerId>,
    {
        let mut positions: Vec<(u64, PeerId)> = peers
            .into_iter()
            .flat_map(|peer| {
                (0..self.replicas).map(move |i| {
                    let label = format!("{}{}", i, peer);
                    ((self.hasher)(label.as_bytes()), peer.clone())
                })
            })
            .collect();

        // Ties are settled by peer id so every node builds the same ring.
        positions.sort();
        positions.dedup_by_key(|(hash, _)| *hash);

        Self {
            replicas: self.replicas,
            hasher: self.hasher,
            positions,
        }
    }

    /// Finds the owner of `key`, `None` when the ring is empty.
    pub fn locate(&self, key: &str) -> Option<&PeerId> {
        if self.positions.is_empty() {
            return None;
        }
        let hash = (self.hasher)(key.as_bytes());
        let idx = self.positions.partition_point(|(pos, _)| *pos < hash);
        let (_, peer) = &self.positions[idx % self.positions.len()];
        Some(peer)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Number of virtual positions on the ring.
    pub fn len(&self) -> usize {
        self.positions.len()
    }
}
