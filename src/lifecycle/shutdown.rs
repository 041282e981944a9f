//! One-shot stop signal fanned out to the accept loop and the metrics server.

use tokio::sync::broadcast;

/// Triggering stops new admissions. Each subscriber drains on its own:
/// `ProxyServer::run` waits for in-flight handlers, the admin server lets
/// open HTTP requests finish.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before the component starts serving, or an early trigger is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Idempotent; a second signal during the drain is harmless.
    pub fn trigger(&self) {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::debug!(subscribers = notified, "Shutdown triggered");
    }

    /// Components that will observe a trigger. A receiver dropped after its
    /// loop exits no longer counts, even if that component is still draining.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
