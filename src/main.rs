//! Layered Cache - admin server
//!
//! Runs the cache engine with its background tasks behind an HTTP admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use layered_cache::api::{create_router, AppState};
use layered_cache::store::{FarStore, InMemoryFarStore, RedisFarStore};
use layered_cache::{spawn_maintenance_task, spawn_warmup_task, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the far store (Redis when `FAR_CACHE_URL` is set, else in-memory)
/// 4. Build the engine and start the maintenance and warm-up tasks
/// 5. Serve the admin API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "layered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Layered Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_l1_entries={}, l1_ttl={}s, l2_ttl={}s, policy={}, port={}, cleanup_interval={}s",
        config.max_l1_entries,
        config.default_l1_ttl,
        config.default_l2_ttl,
        config.eviction_policy,
        config.server_port,
        config.cleanup_interval
    );

    let store: Arc<dyn FarStore> = match &config.far_cache_url {
        Some(url) => Arc::new(
            RedisFarStore::connect(url)
                .await
                .context("failed to connect to the far cache")?,
        ),
        None => {
            warn!("FAR_CACHE_URL not set, using the in-memory far store");
            Arc::new(InMemoryFarStore::new())
        }
    };

    let port = config.server_port;
    let cleanup_interval = config.cleanup_interval;
    let warmup = config.warmup.clone();

    let state = AppState::from_config(config, store).context("failed to build the cache engine")?;
    info!("Cache engine initialized");

    let mut tasks = vec![spawn_maintenance_task(state.engine.clone(), cleanup_interval)];
    if warmup.enabled {
        tasks.push(spawn_warmup_task(state.engine.clone(), warmup.interval));
        info!("Periodic warm-up enabled every {}s", warmup.interval);
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the background tasks.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    for task in &tasks {
        task.abort();
    }
    warn!("Background tasks aborted");
}
