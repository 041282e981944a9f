//! Metrics and health HTTP surface.
//!
//! Routes:
//! - `GET /metrics`: JSON counter snapshot
//! - `GET /metrics/prometheus`: Prometheus text exposition
//! - `GET /health`: liveness
//! - `GET /ready`: readiness (TCP listener bound)

pub mod handlers;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::health::Readiness;
use crate::observability::Counters;
use self::handlers::*;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub counters: Arc<Counters>,
    pub readiness: Arc<Readiness>,
    pub prometheus: Option<PrometheusHandle>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/prometheus", get(get_prometheus))
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin router until shutdown fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Metrics server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Metrics server stopped");
    Ok(())
}
