//! Accept loop and graceful drain.
//!
//! # Responsibilities
//! - Run the accept loop until shutdown is signalled
//! - Spawn one task per admitted connection
//! - On shutdown: drop the listener, then wait for in-flight handlers

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::net::connection::{handle_connection, ConnectionContext, ConnectionTracker};
use crate::net::listener::{Admission, Listener};
use crate::observability::Counters;
use crate::upstream::Forward;

/// The TCP side of the proxy.
pub struct ProxyServer<F> {
    listener: Listener,
    ctx: ConnectionContext<F>,
    tracker: ConnectionTracker,
}

impl<F: Forward> ProxyServer<F> {
    pub fn new(listener: Listener, forwarder: F, counters: Arc<Counters>, timeout: Duration) -> Self {
        Self {
            listener,
            ctx: ConnectionContext {
                forwarder: Arc::new(forwarder),
                counters,
                timeout,
            },
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle to the completion barrier, mainly for observing drains.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept until `shutdown` fires, then drain.
    ///
    /// Returns once the listener is closed and every handler has finished.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let Self {
            listener,
            ctx,
            tracker,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                local_addr = %addr,
                max_connections = listener.max_connections(),
                "Accepting TCP connections"
            );
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(Admission::Admitted { stream, peer_addr, slot }) => {
                        let guard = tracker.track();
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            handle_connection(stream, peer_addr, slot, ctx).await;
                        });
                    }
                    Ok(Admission::Rejected { .. }) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, closing listener");
                    break;
                }
            }
        }

        drop(listener);

        let in_flight = tracker.in_flight();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight connections to finish");
        }
        tracker.wait_idle().await;

        tracing::info!("TCP proxy drained");
    }
}
