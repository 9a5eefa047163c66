//! API Module
//!
//! HTTP handlers and routing for a cache node.
//!
//! # Endpoints
//! - `GET /get/:group/:key` - Read through the group (local, peer or loader)
//! - `PUT /set/:group` - Store a key-value pair on this node
//! - `DELETE /del/:group/:key` - Drop a key from this node
//! - `GET /stats/:group` - Group statistics
//! - `GET /peers` - Current ring membership
//! - `GET /health` - Health check endpoint
//! - `GET /_polaris/:group/:key` - Peer RPC, answered without forwarding

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

/// First path segment of the peer RPC endpoint.
pub const PEER_RPC_PREFIX: &str = "_polaris";
