//! Polaris Cache - A distributed in-process cache
//!
//! Each node keeps a bounded LRU shard, routes keys to their owner over a
//! consistent hash ring and loads missing values exactly once per key.

pub mod api;
pub mod cache;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod group;
pub mod models;
pub mod peers;
pub mod ring;
pub mod server;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheValue;
pub use config::Config;
pub use error::{CacheError, Result};
pub use group::{Group, GroupRegistry, LoadError, Loader, LoaderFn};
pub use peers::{Discovery, MemoryRegistry, PeerId, PeerPicker, Pick, StaticDiscovery};
pub use server::Server;
