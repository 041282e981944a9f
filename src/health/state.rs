//! Process readiness state.
//!
//! # States
//! - Not ready: process is up, TCP listener not yet bound
//! - Ready: TCP listener bound and accepting
//!
//! Liveness has no state; a process able to answer is alive.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip to ready. Called once the TCP listener is bound.
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            tracing::info!("Proxy is ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
