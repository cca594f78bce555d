//! Centralized shutdown management

use std::sync::Arc;

use tokio::sync::watch;

use crate::glpi::SessionManager;

/// Coordinates graceful shutdown: signals the server to stop accepting
/// work, then releases the GLPI session.
#[derive(Clone)]
pub struct ShutdownService {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    session: Arc<SessionManager>,
}

impl ShutdownService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            session,
        }
    }

    /// Subscribe to the shutdown signal
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Trigger shutdown and kill the GLPI session (best effort; errors are
    /// swallowed).
    pub async fn shutdown(&self) {
        tracing::debug!("Initiating graceful shutdown...");
        self.trigger();
        self.session.kill().await;
        tracing::debug!("Shutdown complete");
    }
}
