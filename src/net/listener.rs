//! TCP listener implementation with admission control.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections by rejecting, not queueing
//! - Surface accept errors to the caller's loop

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;
use crate::observability::{ActiveConnection, Counters};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// Result of one accept.
#[derive(Debug)]
pub enum Admission {
    /// The connection got a slot and should be handled.
    Admitted {
        stream: TcpStream,
        peer_addr: SocketAddr,
        slot: ActiveConnection,
    },
    /// The ceiling was reached; the connection has already been closed.
    Rejected { peer_addr: SocketAddr },
}

/// A TCP listener that closes connections beyond `max_connections`.
///
/// Unlike a semaphore-backed listener, a full proxy does not make new
/// clients wait: they observe an immediate close with nothing read.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Shared counters; the active count is the admission gauge.
    counters: Arc<Counters>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig, counters: Arc<Counters>) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;

        Self::from_tcp(listener, config.max_connections, counters)
    }

    /// Wrap an already bound socket.
    pub fn from_tcp(
        listener: TcpListener,
        max_connections: usize,
        counters: Arc<Counters>,
    ) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            counters,
            max_connections,
        })
    }

    /// Accept the next connection and apply the admission policy.
    pub async fn accept(&self) -> Result<Admission, ListenerError> {
        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        match self.counters.try_acquire(self.max_connections) {
            Some(slot) => {
                tracing::debug!(
                    peer_addr = %peer_addr,
                    active_connections = self.counters.active_connections(),
                    "Connection accepted"
                );
                Ok(Admission::Admitted {
                    stream,
                    peer_addr,
                    slot,
                })
            }
            None => {
                drop(stream);
                self.counters.record_rejection();
                tracing::debug!(
                    peer_addr = %peer_addr,
                    max_connections = self.max_connections,
                    "Connection limit reached, rejecting connection"
                );
                Ok(Admission::Rejected { peer_addr })
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Admission ceiling; connections past it are closed unread.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}
