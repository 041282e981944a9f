//! OS signal handling.
//!
//! SIGTERM and SIGINT both mean "stop accepting and drain". Uses Tokio's
//! async-safe signal streams.

use std::io;

/// Resolve when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_termination() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    };
    tracing::info!(signal = name, "Termination signal received");
    Ok(name)
}

/// Resolve on Ctrl+C where Unix signals are unavailable.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Termination signal received");
    Ok("ctrl-c")
}
