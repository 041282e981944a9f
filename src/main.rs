//! TCP to HTTPS bridge.
//!
//! Accepts raw TCP connections, reads one payload per connection, POSTs it to
//! an HTTPS endpoint and writes the response body back to the TCP client.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                   TCP PROXY                      │
//!   TCP client       │  ┌──────────┐   ┌────────────┐   ┌───────────┐   │
//!   ─────────────────┼─▶│ listener │──▶│ connection │──▶│ forwarder │───┼──▶ HTTPS
//!                    │  │admission │   │  handler   │   │ (reqwest) │   │    endpoint
//!   ◀────────────────┼──│          │◀──│            │◀──│           │◀──┼───
//!                    │  └──────────┘   └─────┬──────┘   └───────────┘   │
//!                    │                       ▼                          │
//!                    │                 ┌──────────┐    ┌────────────┐   │
//!   autoscaler ──────┼────────────────▶│  admin   │───▶│  counters  │   │
//!                    │                 │ /metrics │    └────────────┘   │
//!                    │                 └──────────┘                     │
//!                    └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tcp_https_proxy::config::load_config;
use tcp_https_proxy::lifecycle::{self, signals, Shutdown};
use tcp_https_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "tcp-https-proxy")]
#[command(about = "Bridge raw TCP clients to an HTTPS endpoint", long_about = None)]
struct Cli {
    /// Optional TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.upstream.endpoint,
        max_connections = config.listener.max_connections,
        connection_timeout_secs = config.timeouts.connection_secs,
        metrics_address = %config.observability.metrics_address,
        "Configuration loaded"
    );

    let prometheus = match metrics::init_metrics() {
        Ok(handle) => {
            let upkeep = handle.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(5));
                loop {
                    ticker.tick().await;
                    upkeep.run_upkeep();
                }
            });
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder unavailable");
            None
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            match signals::wait_for_termination().await {
                Ok(_) => {
                    tracing::info!("Shutting down TCP proxy...");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
            }
        });
    }

    lifecycle::run(config, prometheus, shutdown).await?;
    Ok(())
}
