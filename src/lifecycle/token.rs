use super::LifecycleState;
use tokio::sync::watch;

/// Cooperative cancellation for long running work.
///
/// Trips as soon as the application starts stopping. Stages that stream or
/// loop should poll [`is_cancelled`](Self::is_cancelled) or race their work
/// against [`cancelled`](Self::cancelled).
///
/// ```rust,ignore
/// let token = lifetime.stopping_token();
/// tokio::select! {
///     _ = token.cancelled() => tracing::info!("draining"),
///     chunk = stream.next() => { /* ... */ }
/// }
/// ```
#[derive(Clone)]
pub struct StoppingToken {
    state: watch::Receiver<LifecycleState>,
}

impl StoppingToken {
    pub(crate) fn new(state: watch::Receiver<LifecycleState>) -> Self {
        Self { state }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow() >= LifecycleState::Stopping
    }

    /// Completes when Stopping fires, or when the lifetime is dropped
    pub async fn cancelled(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|state| *state >= LifecycleState::Stopping)
            .await;
    }
}
