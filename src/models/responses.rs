//! Response DTOs for the cache server API

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::group::GroupStatsSnapshot;
use crate::peers::PeerId;

/// Response body for `GET /get/{group}/{key}`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub group: String,
    pub key: String,
    /// The value, decoded lossily as UTF-8
    pub value: String,
}

impl GetResponse {
    pub fn new(group: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for `PUT /set/{group}`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for `DELETE /del/{group}/{key}`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
    /// Whether the key was cached on this node
    pub removed: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, removed: bool) -> Self {
        let key = key.into();
        let message = if removed {
            format!("Key '{}' deleted successfully", key)
        } else {
            format!("Key '{}' was not cached", key)
        };
        Self {
            message,
            key,
            removed,
        }
    }
}

/// Response body for `GET /stats/{group}`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub group: String,
    #[serde(flatten)]
    pub stats: GroupStatsSnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(group: impl Into<String>, stats: GroupStatsSnapshot) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            group: group.into(),
            stats,
            hit_rate,
        }
    }
}

/// Response body for `GET /peers`
#[derive(Debug, Clone, Serialize)]
pub struct PeersResponse {
    /// This node's address, when it takes part in a cluster
    pub node: Option<PeerId>,
    /// Members of the current ring
    pub peers: Vec<PeerId>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions.
///
/// Also read back by peers, which rely on `kind` to rebuild the error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}
