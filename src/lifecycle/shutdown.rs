//! Shutdown triggers
//!
//! Waits for OS signals or a manual stop request and turns either into the
//! Stopping transition.

use super::ApplicationLifetime;
use std::sync::Arc;
use tokio::signal;

/// Why the application is shutting down
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum ShutdownReason {
    /// Ctrl+C or SIGTERM
    Signal,
    /// [`ApplicationLifetime::stop_application`] was called
    Requested,
}

/// Coordinates the start of a graceful shutdown
///
/// ShutdownHandler listens for OS signals (SIGTERM, SIGINT) and manual stop
/// requests, then fires Stopping on the lifetime it was given.
///
/// # Example
///
/// ```rust,ignore
/// use hostkit::lifecycle::{ApplicationLifetime, ShutdownHandler};
/// use std::sync::Arc;
///
/// let lifetime = Arc::new(ApplicationLifetime::new());
/// let shutdown = ShutdownHandler::new(Arc::clone(&lifetime));
///
/// axum::serve(listener, router)
///     .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await; })
///     .await?;
/// ```
pub struct ShutdownHandler {
    lifetime: Arc<ApplicationLifetime>,
    listen_for_signals: bool,
}

impl ShutdownHandler {
    pub fn new(lifetime: Arc<ApplicationLifetime>) -> Self {
        Self {
            lifetime,
            listen_for_signals: true,
        }
    }

    /// Only react to manual stop requests
    pub fn without_os_signals(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    /// Wait for a shutdown trigger, then fire Stopping
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let reason = self.wait_for_trigger().await;
        tracing::info!(%reason, "Starting graceful shutdown...");

        if reason == ShutdownReason::Signal {
            // Keep the stop flag consistent for anyone polling it.
            self.lifetime.stop_application();
        }
        if let Err(e) = self.lifetime.notify_stopping().await {
            tracing::error!("Error during application stopping: {}", e);
        }
        reason
    }

    async fn wait_for_trigger(&self) -> ShutdownReason {
        if !self.listen_for_signals {
            self.lifetime.stop_requested().await;
            return ShutdownReason::Requested;
        }

        tokio::select! {
            _ = shutdown_signal() => ShutdownReason::Signal,
            _ = self.lifetime.stop_requested() => ShutdownReason::Requested,
        }
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// This is a standalone function that can be used without a ShutdownHandler.
/// If a signal handler cannot be installed the failure is logged and that
/// signal is ignored.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use std::time::Duration;

    #[tokio::test]
    async fn manual_stop_fires_stopping() {
        let lifetime = Arc::new(ApplicationLifetime::new());
        lifetime.notify_started().await.unwrap();

        let handler = ShutdownHandler::new(Arc::clone(&lifetime)).without_os_signals();
        let waiting = tokio::spawn(async move { handler.wait_for_shutdown().await });

        lifetime.stop_application();
        let reason = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reason, ShutdownReason::Requested);
        assert_eq!(lifetime.state(), LifecycleState::Stopping);
    }
}
