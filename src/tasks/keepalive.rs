//! Lease Tasks
//!
//! Periodic upkeep of discovery registrations.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::peers::{Discovery, Lease, MemoryRegistry, PeerId};

/// Spawns a task that refreshes `lease` every `interval`.
///
/// If the registry reports the lease as gone (it expired while this node was
/// stalled), the node registers again and continues with the new lease.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by the server on shutdown.
pub fn spawn_keepalive_task(
    discovery: Arc<dyn Discovery>,
    service: String,
    peer: PeerId,
    lease: Lease,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            service = %service,
            peer = %peer,
            "Starting lease keep-alive every {:?}",
            interval
        );
        let mut lease_id = lease.id;

        loop {
            tokio::time::sleep(interval).await;

            match discovery.keep_alive(lease_id).await {
                Ok(()) => debug!(lease = %lease_id, "lease refreshed"),
                Err(CacheError::NotFound(_)) => {
                    warn!(lease = %lease_id, "lease lost, registering again");
                    match discovery.register(&service, &peer).await {
                        Ok(fresh) => {
                            info!(lease = %fresh.id, "registered with new lease");
                            lease_id = fresh.id;
                        }
                        Err(e) => warn!(error = %e, "re-registration failed"),
                    }
                }
                Err(e) => warn!(lease = %lease_id, error = %e, "lease refresh failed"),
            }
        }
    })
}

/// Spawns a task that drops expired registrations from `registry` every
/// `interval`.
pub fn spawn_lease_reaper(registry: Arc<MemoryRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let removed = registry.reap_expired();
            if removed > 0 {
                info!("Lease reaper: removed {} expired registrations", removed);
            } else {
                debug!("Lease reaper: no expired registrations");
            }
        }
    })
}
