//! Node Server
//!
//! Lifecycle of one cache node: bind, register with discovery, serve the
//! peer RPC and public endpoints, then deregister on shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::error::{CacheError, Result};
use crate::peers::{Discovery, PeerId};
use crate::tasks::spawn_keepalive_task;

/// Lower bound for the lease refresh period.
const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// A bound, not yet serving, node.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    peer: PeerId,
}

impl Server {
    /// Binds `addr`. Port 0 picks a free port; the node identity follows the
    /// address actually bound.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CacheError::Internal(format!("failed to bind {}: {}", addr, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| CacheError::Internal(format!("failed to read local address: {}", e)))?;

        Ok(Self {
            listener,
            addr,
            peer: PeerId::from(addr),
        })
    }

    /// Overrides the identity announced to peers, e.g. when listening on a
    /// wildcard address.
    pub fn advertise(mut self, peer: PeerId) -> Self {
        self.peer = peer;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Identity this node registers under.
    pub fn local_peer(&self) -> &PeerId {
        &self.peer
    }

    // == Serve ==
    /// Registers under `service`, serves until `shutdown` resolves, then
    /// deregisters.
    ///
    /// Deregistration is best-effort: a failure is logged and the registry's
    /// lease expiry is left to prune the node.
    pub async fn serve<F>(
        self,
        state: AppState,
        discovery: Arc<dyn Discovery>,
        service: &str,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lease = discovery.register(service, &self.peer).await?;
        info!(service = %service, node = %self.peer, lease = %lease.id, "registered");

        let keepalive = lease.ttl.map(|ttl| {
            spawn_keepalive_task(
                Arc::clone(&discovery),
                service.to_string(),
                self.peer.clone(),
                lease,
                (ttl / 3).max(MIN_KEEPALIVE_INTERVAL),
            )
        });

        info!("Node listening on http://{}", self.addr);
        let served = axum::serve(self.listener, create_router(state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| CacheError::Internal(format!("server error: {}", e)));

        if let Some(handle) = keepalive {
            handle.abort();
        }
        match discovery.deregister(service, &self.peer).await {
            Ok(()) => info!(service = %service, node = %self.peer, "deregistered"),
            Err(e) => warn!(service = %service, node = %self.peer, error = %e, "deregistration failed"),
        }

        served
    }
}
