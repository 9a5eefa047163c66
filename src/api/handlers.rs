//! API Handlers
//!
//! HTTP request handlers for each endpoint of a cache node.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::group::{Group, GroupRegistry};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, PeersResponse, SetRequest, SetResponse,
    StatsResponse,
};
use crate::peers::PeerPicker;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Groups served by this node
    pub groups: Arc<GroupRegistry>,
    /// Ring view, absent on a standalone node
    pub picker: Option<Arc<PeerPicker>>,
}

impl AppState {
    pub fn new(groups: Arc<GroupRegistry>) -> Self {
        Self {
            groups,
            picker: None,
        }
    }

    pub fn with_picker(mut self, picker: Arc<PeerPicker>) -> Self {
        self.picker = Some(picker);
        self
    }

    fn group(&self, name: &str) -> Result<Arc<Group>> {
        self.groups
            .get(name)
            .ok_or_else(|| CacheError::UnknownGroup(name.to_string()))
    }
}

/// Handler for `GET /_polaris/:group/:key`
///
/// Answers a peer from the local store or the local loader. The value is
/// returned as raw bytes; errors carry their kind in a JSON body.
pub async fn peer_get_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    debug!(group = %group, key = %key, "peer request");
    let value = state.group(&group)?.load_local(&key).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        value.into_bytes(),
    ))
}

/// Handler for `GET /get/:group/:key`
pub async fn get_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let value = state.group(&group)?.get(&key).await?;

    Ok(Json(GetResponse::new(group, key, value.to_string_lossy())))
}

/// Handler for `PUT /set/:group`
///
/// The value lands in this node's store only.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.group(&group)?.set(&req.key, req.value)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for `DELETE /del/:group/:key`
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.group(&group)?.remove(&key)?;

    Ok(Json(DeleteResponse::new(key, removed)))
}

/// Handler for `GET /stats/:group`
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<StatsResponse>> {
    let stats = state.group(&group)?.stats();

    Ok(Json(StatsResponse::new(group, stats)))
}

/// Handler for `GET /peers`
pub async fn peers_handler(State(state): State<AppState>) -> Json<PeersResponse> {
    let response = match &state.picker {
        Some(picker) => PeersResponse {
            node: Some(picker.self_id().clone()),
            peers: picker.peers(),
        },
        None => PeersResponse {
            node: None,
            peers: Vec::new(),
        },
    };
    Json(response)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheValue;
    use crate::group::{LoadError, LoaderFn};

    fn test_state() -> AppState {
        let groups = Arc::new(GroupRegistry::new());
        let loader = LoaderFn::new(|key: String| async move {
            match key.as_str() {
                "missing" => Err(LoadError::NotFound),
                "broken" => Err(LoadError::failed("db down")),
                _ => Ok(CacheValue::from(format!("loaded:{}", key))),
            }
        });
        groups.insert(Group::new("scores", 1024, loader)).unwrap();
        AppState::new(groups)
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = SetRequest {
            key: "test_key".to_string(),
            value: "test_value".to_string(),
        };
        let result = set_handler(State(state.clone()), Path("scores".to_string()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(
            State(state),
            Path(("scores".to_string(), "test_key".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(response.value, "test_value");
    }

    #[tokio::test]
    async fn test_get_runs_loader_on_miss() {
        let state = test_state();

        let response = get_handler(
            State(state),
            Path(("scores".to_string(), "tom".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(response.value, "loaded:tom");
    }

    #[tokio::test]
    async fn test_get_propagates_loader_errors() {
        let state = test_state();

        let missing = get_handler(
            State(state.clone()),
            Path(("scores".to_string(), "missing".to_string())),
        )
        .await;
        assert!(matches!(missing, Err(CacheError::NotFound(_))));

        let broken = get_handler(
            State(state),
            Path(("scores".to_string(), "broken".to_string())),
        )
        .await;
        assert!(matches!(broken, Err(CacheError::LoaderFailed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_group_is_reported_as_such() {
        let state = test_state();

        let result = get_handler(
            State(state),
            Path(("nope".to_string(), "k".to_string())),
        )
        .await;
        assert_eq!(result.err(), Some(CacheError::UnknownGroup("nope".into())));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        let req = SetRequest {
            key: "to_delete".to_string(),
            value: "value".to_string(),
        };
        set_handler(State(state.clone()), Path("scores".to_string()), Json(req))
            .await
            .unwrap();

        let response = delete_handler(
            State(state.clone()),
            Path(("scores".to_string(), "to_delete".to_string())),
        )
        .await
        .unwrap();
        assert!(response.removed);

        let again = delete_handler(
            State(state),
            Path(("scores".to_string(), "to_delete".to_string())),
        )
        .await
        .unwrap();
        assert!(!again.removed);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();

        let response = stats_handler(State(state), Path("scores".to_string()))
            .await
            .unwrap();
        assert_eq!(response.stats.hits, 0);
        assert_eq!(response.stats.misses, 0);
    }

    #[tokio::test]
    async fn test_peers_handler_without_cluster() {
        let response = peers_handler(State(test_state())).await;
        assert!(response.node.is_none());
        assert!(response.peers.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let req = SetRequest {
            key: "".to_string(),
            value: "value".to_string(),
        };
        let result = set_handler(State(state), Path("scores".to_string()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
