//! Graceful shutdown handling.
//!
//! Turns SIGINT/SIGTERM into a broadcast that each long-running component
//! waits on through its own [`ShutdownGuard`].

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Handle for managing graceful shutdown.
#[derive(Clone)]
pub struct GracefulShutdown {
    /// Sender for shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    /// Get a receiver for shutdown signals.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        if self.shutdown_tx.send(()).is_err() {
            debug!("No component is waiting for shutdown");
        }
    }

    /// Spawn a task that triggers shutdown on SIGINT or SIGTERM.
    pub fn listen_for_signals(&self) {
        let handler = self.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    error!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C signal"),
                _ = terminate => info!("Received SIGTERM signal"),
            }

            handler.shutdown();
        });
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// One component's subscription to the shutdown broadcast.
pub struct ShutdownGuard {
    name: String,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ShutdownGuard {
    /// Create a new shutdown guard for a component.
    pub fn new(name: impl Into<String>, shutdown_handler: &GracefulShutdown) -> Self {
        Self {
            name: name.into(),
            shutdown_rx: shutdown_handler.subscribe(),
        }
    }

    /// Wait for the shutdown signal, or for every handler to be dropped.
    pub async fn wait_for_shutdown(mut self) {
        match self.shutdown_rx.recv().await {
            Ok(()) => {
                info!("Component '{}' received shutdown signal", self.name);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Shutdown channel closed for component '{}'", self.name);
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                warn!("Component '{}' lagged behind shutdown signal", self.name);
            }
        }
    }
}
