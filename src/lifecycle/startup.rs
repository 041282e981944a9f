//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the upstream client
//! - Start the metrics server
//! - Bind the TCP listener and mark the process ready
//! - Run the accept loop until shutdown, then drain
//!
//! # Design Decisions
//! - Fail fast: upstream client or TCP bind errors are fatal
//! - A metrics server that cannot bind is logged, not fatal
//! - Listener starts last (traffic only when ready)

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{self, AdminState};
use crate::config::ProxyConfig;
use crate::health::Readiness;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError, ProxyServer};
use crate::observability::Counters;
use crate::upstream::{ForwardError, HttpsForwarder};

/// Errors that stop the process before it serves traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to start TCP listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] ForwardError),
}

/// Run the proxy until `shutdown` is triggered and every connection drained.
pub async fn run(
    config: ProxyConfig,
    prometheus: Option<PrometheusHandle>,
    shutdown: Arc<Shutdown>,
) -> Result<(), StartupError> {
    let counters = Arc::new(Counters::new());
    let readiness = Arc::new(Readiness::new());
    let timeout = config.timeouts.connection();

    // Subscribe before anything can block so an early signal is not missed.
    let proxy_shutdown = shutdown.subscribe();
    let admin_shutdown = shutdown.subscribe();

    let forwarder = HttpsForwarder::new(&config.upstream, timeout)?;

    let admin_task = match TcpListener::bind(&config.observability.metrics_address).await {
        Ok(listener) => {
            let router = admin::setup_admin_router(AdminState {
                counters: Arc::clone(&counters),
                readiness: Arc::clone(&readiness),
                prometheus,
            });
            Some(tokio::spawn(async move {
                if let Err(e) = admin::serve(listener, router, admin_shutdown).await {
                    tracing::error!(error = %e, "Metrics server error");
                }
            }))
        }
        Err(e) => {
            tracing::error!(
                address = %config.observability.metrics_address,
                error = %e,
                "Metrics server failed to bind"
            );
            None
        }
    };

    let listener = Listener::bind(&config.listener, Arc::clone(&counters)).await?;
    readiness.mark_ready();

    tracing::info!(
        address = %config.listener.bind_address,
        endpoint = %forwarder.endpoint(),
        "TCP proxy listening"
    );

    let server = ProxyServer::new(listener, forwarder, counters, timeout);
    server.run(proxy_shutdown).await;

    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("TCP proxy shutdown complete");
    Ok(())
}
