//! API Routes
//!
//! Configures the Axum router with the public and peer endpoints.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_handler, get_handler, health_handler, peer_get_handler, peers_handler, set_handler,
    stats_handler, AppState,
};
use super::PEER_RPC_PREFIX;

/// Creates the main router with all endpoints configured.
///
/// Every request is traced through `tower_http`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            &format!("/{}/:group/:key", PEER_RPC_PREFIX),
            get(peer_get_handler),
        )
        .route("/get/:group/:key", get(get_handler))
        .route("/set/:group", put(set_handler))
        .route("/del/:group/:key", delete(delete_handler))
        .route("/stats/:group", get(stats_handler))
        .route("/peers", get(peers_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
