//! HTTP client side of the peer RPC.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::api::PEER_RPC_PREFIX;
use crate::cache::CacheValue;
use crate::error::{CacheError, Result};
use crate::models::ErrorResponse;
use crate::peers::{PeerGetter, PeerId};

/// Talks to one remote node over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    peer: PeerId,
    base: String,
    http_client: reqwest::Client,
}

impl HttpPeerClient {
    /// Creates a client for `peer` reusing the connection pool of `http_client`.
    pub fn new(peer: PeerId, http_client: reqwest::Client) -> Self {
        let base = format!("http://{}", peer);
        Self {
            peer,
            base,
            http_client,
        }
    }

    /// Builds a shared HTTP client whose requests give up after `timeout`.
    pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(timeout).build()
    }

    fn url(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| CacheError::peer_unavailable(self.peer.as_str(), e))?;
        url.path_segments_mut()
            .map_err(|_| CacheError::peer_unavailable(self.peer.as_str(), "invalid base url"))?
            .push(PEER_RPC_PREFIX)
            .push(group)
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl PeerGetter for HttpPeerClient {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    async fn get(&self, group: &str, key: &str) -> Result<CacheValue> {
        let url = self.url(group, key)?;
        debug!(peer = %self.peer, group = %group, key = %key, "fetching from peer");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::peer_unavailable(self.peer.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::OK {
            let body = response
                .bytes()
                .await
                .map_err(|e| CacheError::peer_unavailable(self.peer.as_str(), e))?;
            return Ok(CacheValue::from(body));
        }

        match response.json::<ErrorResponse>().await {
            Ok(err) => Err(CacheError::from_remote(
                self.peer.as_str(),
                key,
                err.kind,
                err.error,
            )),
            Err(_) => Err(CacheError::peer_unavailable(
                self.peer.as_str(),
                format!("unexpected status {}", status),
            )),
        }
    }
}
