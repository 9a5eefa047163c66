//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::time::Duration;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, also used as this node's peer identity
    pub node_addr: String,
    /// Name under which nodes register with discovery
    pub service_name: String,
    /// Name of the cache group served by this node
    pub group_name: String,
    /// Byte capacity of the local store (0 = unbounded)
    pub cache_bytes: usize,
    /// Virtual nodes per peer on the hash ring
    pub ring_replicas: usize,
    /// Statically known peer addresses
    pub peers: Vec<String>,
    /// Timeout for one peer RPC in milliseconds
    pub rpc_timeout_ms: u64,
    /// Default deadline for a Get in milliseconds (0 = none)
    pub request_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `NODE_ADDR` - Listen address (default: 127.0.0.1:8001)
    /// - `SERVICE_NAME` - Discovery service name (default: polaris-cache)
    /// - `GROUP_NAME` - Cache group name (default: test)
    /// - `CACHE_BYTES` - Local store capacity in bytes (default: 2 MiB)
    /// - `RING_REPLICAS` - Virtual nodes per peer (default: 50)
    /// - `PEERS` - Comma separated peer addresses (default: none)
    /// - `RPC_TIMEOUT_MS` - Peer RPC timeout (default: 3000)
    /// - `REQUEST_TIMEOUT_MS` - Get deadline, 0 disables it (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            node_addr: env::var("NODE_ADDR").unwrap_or(defaults.node_addr),
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            group_name: env::var("GROUP_NAME").unwrap_or(defaults.group_name),
            cache_bytes: parse_var("CACHE_BYTES").unwrap_or(defaults.cache_bytes),
            ring_replicas: parse_var("RING_REPLICAS").unwrap_or(defaults.ring_replicas),
            peers: env::var("PEERS")
                .map(|v| parse_peer_list(&v))
                .unwrap_or(defaults.peers),
            rpc_timeout_ms: parse_var("RPC_TIMEOUT_MS").unwrap_or(defaults.rpc_timeout_ms),
            request_timeout_ms: parse_var("REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Default Get deadline, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_addr: "127.0.0.1:8001".to_string(),
            service_name: "polaris-cache".to_string(),
            group_name: "test".to_string(),
            cache_bytes: 2 << 20,
            ring_replicas: 50,
            peers: Vec::new(),
            rpc_timeout_ms: 3000,
            request_timeout_ms: 0,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Splits a comma separated address list, dropping blanks.
fn parse_peer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
