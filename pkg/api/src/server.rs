use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::AppState;
use crate::handlers::{advisor, health, leases, resources};
use crate::request_id::request_id_middleware;
use pkg_controllers::ExpirySweeper;
use pkg_metrics::LeaseMetrics;
use pkg_state::StateStore;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: String,
    pub sweep_interval: Duration,
}

/// Build the HTTP router over already-initialised state.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/health", get(health::health))
        // Resource registry
        .route(
            "/api/resources",
            post(resources::create_resource).get(resources::list_resources),
        )
        .route("/api/resources/{id}", get(resources::get_resource))
        // Lease lifecycle
        .route("/api/locks", get(leases::list_leases))
        .route("/api/locks/acquire", post(leases::acquire))
        .route("/api/locks/release", post(leases::release))
        .route("/api/locks/heartbeat", post(leases::heartbeat))
        .route("/api/locks/{resource_id}", get(leases::get_lease))
        // Advisor
        .route("/api/advisor/suggest", post(advisor::suggest_ttl));

    Router::new()
        .route("/", get(health::root))
        .route("/metrics", get(health::metrics))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize core subsystems
    let store = StateStore::new(&config.data_dir).await?;
    let metrics = Arc::new(LeaseMetrics::new());
    let state = AppState::new(store.clone(), metrics.clone());

    // Start the ExpirySweeper background task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirySweeper::new(Arc::new(store.clone()), metrics, config.sweep_interval)
        .start(shutdown_rx);

    let app = router(state);

    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop background work before closing the store, even if serving failed.
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!("ExpirySweeper task ended abnormally: {}", e);
    }
    store.close().await?;
    served?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
