//! Per-connection lifecycle and drain tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Run one connection end to end: read, forward, respond
//! - Record request bookkeeping at the completion point
//! - Let shutdown wait for every in-flight handler

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};

use crate::observability::{ActiveConnection, Counters};
use crate::upstream::Forward;

/// Size of the single read taken from each client.
pub const READ_BUFFER_SIZE: usize = 4096;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-wide sequence number attached to every log line of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Socket-level failures inside a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("read timed out")]
    ReadTimeout,

    #[error("peer closed the connection before sending data")]
    EmptyRead,

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("write timed out")]
    WriteTimeout,

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Which path a handler took.
#[derive(Debug)]
pub enum Outcome {
    /// Upstream replied and the reply was written back.
    Forwarded { request_bytes: usize, response_bytes: usize },
    /// Upstream failed and an `ERROR:` line was written back.
    UpstreamFailed { message: String },
    /// Writing the reply (or the error line) failed.
    WriteFailed(HandlerError),
    /// The initial read failed; upstream was never contacted.
    Aborted(HandlerError),
}

impl Outcome {
    /// Whether this session updates `total_requests` and the last duration.
    /// A handler that never got a payload is not a request.
    pub fn counts_as_request(&self) -> bool {
        !matches!(self, Outcome::Aborted(_))
    }
}

/// Everything a handler needs besides its socket.
pub struct ConnectionContext<F> {
    pub forwarder: Arc<F>,
    pub counters: Arc<Counters>,
    pub timeout: Duration,
}

impl<F> Clone for ConnectionContext<F> {
    fn clone(&self) -> Self {
        Self {
            forwarder: Arc::clone(&self.forwarder),
            counters: Arc::clone(&self.counters),
            timeout: self.timeout,
        }
    }
}

/// Handle one admitted connection to completion.
///
/// `slot` is the active-connection claim made at admission; it is released
/// when this function returns, whichever path it takes. The stream is closed
/// on return as well.
pub async fn handle_connection<S, F>(
    mut stream: S,
    peer_addr: SocketAddr,
    slot: ActiveConnection,
    ctx: ConnectionContext<F>,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Forward,
{
    let _slot = slot;
    let id = ConnectionId::new();
    let start = Instant::now();
    let deadline = start + ctx.timeout;

    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Connection opened");

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let read = match timeout_at(deadline, stream.read(&mut buffer)).await {
        Ok(Ok(0)) => Err(HandlerError::EmptyRead),
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(HandlerError::Read(e)),
        Err(_) => Err(HandlerError::ReadTimeout),
    };

    let outcome = match read {
        Ok(n) => {
            buffer.truncate(n);
            exchange(&mut stream, buffer, deadline, &ctx, id, peer_addr).await
        }
        Err(e) => {
            tracing::warn!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Failed to read from TCP connection");
            Outcome::Aborted(e)
        }
    };

    if let Outcome::WriteFailed(e) = &outcome {
        tracing::warn!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Failed to write response to TCP connection");
    }

    // Best effort; the peer may already be gone.
    let _ = stream.shutdown().await;

    let elapsed = start.elapsed();
    if outcome.counts_as_request() {
        ctx.counters.record_completion(elapsed);
    }

    tracing::debug!(
        connection_id = %id,
        peer_addr = %peer_addr,
        elapsed_ms = elapsed.as_millis() as u64,
        counted = outcome.counts_as_request(),
        "Connection closed"
    );

    outcome
}

/// Forward the payload and write back either the reply or an error line.
async fn exchange<S, F>(
    stream: &mut S,
    payload: Vec<u8>,
    deadline: Instant,
    ctx: &ConnectionContext<F>,
    id: ConnectionId,
    peer_addr: SocketAddr,
) -> Outcome
where
    S: AsyncWrite + Unpin,
    F: Forward,
{
    let request_bytes = payload.len();
    match ctx.forwarder.forward(payload).await {
        Ok(response) => match write_all_by(stream, &response, deadline).await {
            Ok(()) => Outcome::Forwarded {
                request_bytes,
                response_bytes: response.len(),
            },
            Err(e) => Outcome::WriteFailed(e),
        },
        Err(e) => {
            ctx.counters.record_upstream_failure();
            tracing::error!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Failed to forward to HTTPS");
            let line = format!("ERROR: {}\n", e);
            match write_all_by(stream, line.as_bytes(), deadline).await {
                Ok(()) => Outcome::UpstreamFailed {
                    message: e.to_string(),
                },
                Err(write_err) => Outcome::WriteFailed(write_err),
            }
        }
    }
}

async fn write_all_by<S>(stream: &mut S, bytes: &[u8], deadline: Instant) -> Result<(), HandlerError>
where
    S: AsyncWrite + Unpin,
{
    match timeout_at(deadline, stream.write_all(bytes)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerError::Write(e)),
        Err(_) => Err(HandlerError::WriteTimeout),
    }
}

/// Completion barrier for in-flight handlers.
///
/// Each handler holds a [`HandlerGuard`]; [`ConnectionTracker::wait_idle`]
/// resolves once every guard has been dropped.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    in_flight: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            in_flight: Arc::new(tx),
        }
    }

    /// Register a handler. The returned guard must live as long as the handler.
    pub fn track(&self) -> HandlerGuard {
        self.in_flight.send_modify(|n| *n += 1);
        HandlerGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no handler is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a handler counted by its [`ConnectionTracker`] until dropped.
#[derive(Debug)]
pub struct HandlerGuard {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
