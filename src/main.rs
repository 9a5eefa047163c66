//! Polaris Cache node binary
//!
//! Runs one cache node serving a single group whose loader derives values
//! from the key, with membership taken from a static peer list.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polaris_cache::peers::HttpPeerClient;
use polaris_cache::{
    AppState, CacheValue, Config, Discovery, Group, GroupRegistry, LoadError, LoaderFn,
    PeerPicker, Server, StaticDiscovery,
};

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Bind the listener and start following membership
/// 4. Create the cache group and wire it to the peer picker
/// 5. Serve until SIGINT/SIGTERM, then deregister
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polaris_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Polaris cache node");

    let config = Config::from_env();
    info!(
        "Configuration loaded: node={}, group={}, cache_bytes={}, replicas={}, peers={:?}",
        config.node_addr, config.group_name, config.cache_bytes, config.ring_replicas, config.peers
    );

    let server = Server::bind(&config.node_addr)
        .await
        .with_context(|| format!("binding {}", config.node_addr))?;
    let node = server.local_peer().clone();

    let http_client =
        HttpPeerClient::http_client(config.rpc_timeout()).context("building peer HTTP client")?;
    let discovery: Arc<dyn Discovery> = Arc::new(StaticDiscovery::new(config.peers.clone()));
    let picker = PeerPicker::new(
        node.clone(),
        config.service_name.clone(),
        Arc::clone(&discovery),
        config.ring_replicas,
        http_client,
    );
    picker.start();

    let node_name = node.to_string();
    let loader = LoaderFn::new(move |key: String| {
        let node_name = node_name.clone();
        async move {
            info!(key = %key, "loading from source");
            Ok::<_, LoadError>(CacheValue::from(format!("{}@{}", key, node_name)))
        }
    });
    let group = Group::new(config.group_name.clone(), config.cache_bytes, loader)
        .with_request_timeout(config.request_timeout());

    let groups = Arc::new(GroupRegistry::new());
    let group = groups.insert(group).context("creating cache group")?;
    group
        .register_peers(Arc::clone(&picker))
        .context("registering peers")?;
    info!(group = %group.name(), "Cache group ready");

    let state = AppState::new(groups).with_picker(Arc::clone(&picker));
    server
        .serve(state, discovery, &config.service_name, shutdown_signal())
        .await
        .context("serving")?;

    picker.shutdown();
    info!("Node shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
