//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Every variant carries a
//! stable wire kind so that peers can tell "key absent" apart from
//! "cache temporarily degraded" across the RPC boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache groups, peers and the RPC layer.
///
/// The type is `Clone` because a single failed load is handed verbatim to
/// every caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The data source reports that the key does not exist
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The owning peer could not be reached or did not answer sensibly
    #[error("Peer {peer} unavailable: {reason}")]
    PeerUnavailable { peer: String, reason: String },

    /// A local or remote loader returned an error
    #[error("Loader failed for key {key}: {reason}")]
    LoaderFailed { key: String, reason: String },

    /// No peer currently owns the key (empty or undiscovered cluster)
    #[error("No owner for key: {0}")]
    NoOwner(String),

    /// The caller's deadline expired while waiting
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// The node does not serve the named cache group
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Error Kind ==
/// Stable discriminant sent over the wire next to the human readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PeerUnavailable,
    LoaderFailed,
    NoOwner,
    Cancelled,
    UnknownGroup,
    InvalidRequest,
    Internal,
}

impl CacheError {
    /// Returns the wire kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::PeerUnavailable { .. } => ErrorKind::PeerUnavailable,
            CacheError::LoaderFailed { .. } => ErrorKind::LoaderFailed,
            CacheError::NoOwner(_) => ErrorKind::NoOwner,
            CacheError::Cancelled(_) => ErrorKind::Cancelled,
            CacheError::UnknownGroup(_) => ErrorKind::UnknownGroup,
            CacheError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CacheError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status used when this error leaves a node.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnknownGroup => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::LoaderFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::PeerUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::NoOwner => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuilds an error reported by a remote peer.
    ///
    /// Only the absence of a key, a loader failure and a malformed request
    /// keep their meaning across the hop. Anything else means the peer could
    /// not serve the request and is reported as `PeerUnavailable`.
    pub fn from_remote(peer: &str, key: &str, kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotFound => CacheError::NotFound(key.to_string()),
            ErrorKind::LoaderFailed => CacheError::LoaderFailed {
                key: key.to_string(),
                reason: format!("peer {}: {}", peer, message),
            },
            ErrorKind::InvalidRequest => CacheError::InvalidRequest(message),
            ErrorKind::PeerUnavailable
            | ErrorKind::NoOwner
            | ErrorKind::Cancelled
            | ErrorKind::UnknownGroup
            | ErrorKind::Internal => CacheError::PeerUnavailable {
                peer: peer.to_string(),
                reason: message,
            },
        }
    }

    /// Shorthand for a transport level failure talking to `peer`.
    pub fn peer_unavailable(peer: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::PeerUnavailable {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::new(self.to_string(), self.kind()));
        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
