//! Application lifetime
//!
//! The signal bus components use to observe Started, Stopping and Stopped,
//! and to request a graceful stop.

use super::{LifecycleError, Result, StoppingToken};
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Where the application is in its lifetime. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum LifecycleState {
    NotStarted,
    Started,
    Stopping,
    Stopped,
}

/// A notification point. Each fires at most once, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum LifecycleSignal {
    /// The server is bound and accepting traffic
    Started,
    /// Shutdown was requested; begin draining
    Stopping,
    /// Shutdown work is complete
    Stopped,
}

impl LifecycleSignal {
    pub const ALL: [LifecycleSignal; 3] = [
        LifecycleSignal::Started,
        LifecycleSignal::Stopping,
        LifecycleSignal::Stopped,
    ];

    /// The state the application is in once this signal has fired
    pub fn state(self) -> LifecycleState {
        match self {
            LifecycleSignal::Started => LifecycleState::Started,
            LifecycleSignal::Stopping => LifecycleState::Stopping,
            LifecycleSignal::Stopped => LifecycleState::Stopped,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

type CallbackFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

#[derive(Clone)]
enum Callback {
    Sync(Arc<dyn Fn() + Send + Sync>),
    Async(Arc<dyn Fn() -> CallbackFuture + Send + Sync>),
}

#[derive(Clone)]
struct Registered {
    name: String,
    callback: Callback,
}

/// Lifecycle signal bus
///
/// Created once per host and handed to components explicitly (the host also
/// registers it in the service registry as `ApplicationLifetime`), so every
/// test can build its own isolated instance.
///
/// Callbacks run in registration order. A failing or panicking callback is
/// logged and skipped; it never prevents the remaining callbacks or the next
/// transition.
///
/// # Example
///
/// ```rust
/// use hostkit::lifecycle::ApplicationLifetime;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lifetime = ApplicationLifetime::new();
/// lifetime
///     .on_started(|| tracing::info!("started"))
///     .on_stopped(|| tracing::info!("stopped"));
///
/// lifetime.notify_started().await.unwrap();
/// lifetime.notify_stopped().await.unwrap(); // fires Stopping first
/// # }
/// ```
pub struct ApplicationLifetime {
    callbacks: [Mutex<Vec<Registered>>; 3],
    state: watch::Sender<LifecycleState>,
    stop_requested: watch::Sender<bool>,
    transition: tokio::sync::Mutex<()>,
}

impl Default for ApplicationLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationLifetime {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        let (stop_requested, _) = watch::channel(false);
        Self {
            callbacks: Default::default(),
            state,
            stop_requested,
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Register a callback for Started
    pub fn on_started<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(LifecycleSignal::Started, callback)
    }

    /// Register a callback for Stopping
    ///
    /// Stopping callbacks should start a drain, not block. Long running work
    /// should watch a [`StoppingToken`] instead.
    pub fn on_stopping<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(LifecycleSignal::Stopping, callback)
    }

    /// Register a callback for Stopped
    pub fn on_stopped<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(LifecycleSignal::Stopped, callback)
    }

    /// Register a synchronous callback for `signal`
    ///
    /// If `signal` has already fired the callback runs immediately.
    pub fn on<F>(&self, signal: LifecycleSignal, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let registered = Registered {
            name: std::any::type_name::<F>().to_string(),
            callback: Callback::Sync(Arc::new(callback)),
        };
        self.register(signal, registered);
        self
    }

    /// Register an asynchronous, fallible callback for `signal`
    ///
    /// The future runs on its own task so a panic inside it is contained. If
    /// `signal` has already fired the callback is spawned immediately.
    pub fn on_async<F, Fut>(&self, signal: LifecycleSignal, name: impl Into<String>, callback: F) -> &Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let registered = Registered {
            name: name.into(),
            callback: Callback::Async(Arc::new(move || Box::pin(callback()) as CallbackFuture)),
        };
        self.register(signal, registered);
        self
    }

    pub fn callback_count(&self, signal: LifecycleSignal) -> usize {
        self.callbacks(signal).len()
    }

    /// Fire Started
    ///
    /// Returns `Ok(false)` when Started has already fired.
    pub async fn notify_started(&self) -> Result<bool> {
        self.advance(LifecycleSignal::Started).await
    }

    /// Fire Stopping
    ///
    /// Fails with [`LifecycleError::InvalidTransition`] if the application
    /// never started. Returns `Ok(false)` when Stopping has already fired.
    pub async fn notify_stopping(&self) -> Result<bool> {
        self.advance(LifecycleSignal::Stopping).await
    }

    /// Fire Stopped, firing Stopping first if it has not fired yet
    pub async fn notify_stopped(&self) -> Result<bool> {
        self.advance(LifecycleSignal::Stopped).await
    }

    /// Fire Stopped with an upper bound on how long its callbacks may take
    pub async fn notify_stopped_with_timeout(&self, timeout: Duration) -> Result<bool> {
        tokio::time::timeout(timeout, self.notify_stopped())
            .await
            .map_err(|_| LifecycleError::timeout("Stopped", format!("Timeout after {:?}", timeout)))?
    }

    /// Request a graceful stop
    ///
    /// The host reacts by firing Stopping, draining, then firing Stopped.
    /// Calling this more than once has no further effect.
    pub fn stop_application(&self) {
        let first = self.stop_requested.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        });
        if first {
            tracing::info!("Application stop requested");
        } else {
            tracing::debug!("Application stop already requested");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop_requested.borrow()
    }

    /// Completes once [`stop_application`](Self::stop_application) has been called
    pub async fn stop_requested(&self) {
        let mut requested = self.stop_requested.subscribe();
        let _ = requested.wait_for(|requested| *requested).await;
    }

    /// Completes once the application has reached `state` or gone past it
    pub async fn wait_for(&self, state: LifecycleState) {
        let mut current = self.state.subscribe();
        let _ = current.wait_for(|current| *current >= state).await;
    }

    /// A cooperative cancellation token that trips when Stopping fires
    pub fn stopping_token(&self) -> StoppingToken {
        StoppingToken::new(self.state.subscribe())
    }

    fn callbacks(&self, signal: LifecycleSignal) -> std::sync::MutexGuard<'_, Vec<Registered>> {
        self.callbacks[signal.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, signal: LifecycleSignal, registered: Registered) {
        // Checked under the list lock so a concurrent fire either sees the
        // callback in its snapshot or this call sees the signal as fired.
        let already_fired = {
            let mut callbacks = self.callbacks(signal);
            if self.state() >= signal.state() {
                true
            } else {
                callbacks.push(registered.clone());
                false
            }
        };

        if already_fired {
            tracing::debug!(%signal, callback = %registered.name, "Signal already fired, running callback now");
            match &registered.callback {
                Callback::Sync(_) => {
                    if let Err(e) = run_sync(signal, &registered) {
                        tracing::error!(%signal, callback = %registered.name, "{}", e);
                    }
                }
                Callback::Async(_) => match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(e) = run_callback(signal, &registered).await {
                                tracing::error!(%signal, callback = %registered.name, "{}", e);
                            }
                        });
                    }
                    Err(_) => tracing::warn!(
                        %signal,
                        callback = %registered.name,
                        "No runtime available, late async callback dropped"
                    ),
                },
            }
        }
    }

    async fn advance(&self, target: LifecycleSignal) -> Result<bool> {
        let _transition = self.transition.lock().await;

        let current = self.state();
        if current >= target.state() {
            tracing::debug!(signal = %target, state = %current, "Signal already fired");
            return Ok(false);
        }
        if current == LifecycleState::NotStarted && target != LifecycleSignal::Started {
            return Err(LifecycleError::InvalidTransition {
                signal: target,
                state: current,
            });
        }

        for signal in LifecycleSignal::ALL {
            if signal.state() > current && signal.state() <= target.state() {
                self.fire(signal).await;
            }
        }
        Ok(true)
    }

    async fn fire(&self, signal: LifecycleSignal) {
        let snapshot = {
            let callbacks = self.callbacks(signal);
            self.state.send_replace(signal.state());
            callbacks.clone()
        };

        tracing::info!(%signal, callbacks = snapshot.len(), "Firing lifecycle signal");

        let mut failed = 0;
        for registered in &snapshot {
            tracing::debug!(%signal, callback = %registered.name, "Running lifecycle callback");
            if let Err(e) = run_callback(signal, registered).await {
                // Log error but continue with other callbacks
                failed += 1;
                tracing::error!(%signal, callback = %registered.name, "{}", e);
            }
        }

        tracing::info!(
            %signal,
            executed = snapshot.len(),
            failed,
            "Lifecycle signal complete"
        );
    }
}

async fn run_callback(signal: LifecycleSignal, registered: &Registered) -> Result<()> {
    match &registered.callback {
        Callback::Sync(_) => run_sync(signal, registered),
        Callback::Async(callback) => match tokio::spawn(callback()).await {
            Ok(result) => result.map_err(|e| match e {
                LifecycleError::CallbackFailed { .. } => e,
                other => LifecycleError::callback_failed(signal, &registered.name, other.to_string()),
            }),
            Err(join) if join.is_panic() => Err(LifecycleError::callback_failed(
                signal,
                &registered.name,
                format!("panicked: {}", panic_message(join.into_panic())),
            )),
            Err(join) => Err(LifecycleError::callback_failed(
                signal,
                &registered.name,
                join.to_string(),
            )),
        },
    }
}

fn run_sync(signal: LifecycleSignal, registered: &Registered) -> Result<()> {
    let Callback::Sync(callback) = &registered.callback else {
        return Ok(());
    };
    catch_unwind(AssertUnwindSafe(|| callback())).map_err(|payload| {
        LifecycleError::callback_failed(
            signal,
            &registered.name,
            format!("panicked: {}", panic_message(payload)),
        )
    })
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn() + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &str| {
            let sink = Arc::clone(&sink);
            let label = label.to_string();
            Box::new(move || sink.lock().unwrap().push(label.clone())) as Box<dyn Fn() + Send + Sync>
        };
        (log, make)
    }

    #[tokio::test]
    async fn signals_fire_once_in_order() {
        let lifetime = ApplicationLifetime::new();
        let (log, make) = recorder();

        lifetime.on_stopped(make("stopped"));
        lifetime.on_started(make("started-1"));
        lifetime.on_started(make("started-2"));
        lifetime.on_stopping(make("stopping"));

        assert!(lifetime.notify_started().await.unwrap());
        assert!(lifetime.notify_stopping().await.unwrap());
        assert!(lifetime.notify_stopped().await.unwrap());

        assert!(!lifetime.notify_started().await.unwrap());
        assert!(!lifetime.notify_stopping().await.unwrap());
        assert!(!lifetime.notify_stopped().await.unwrap());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["started-1", "started-2", "stopping", "stopped"]
        );
        assert_eq!(lifetime.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn signals_with_no_callbacks_still_advance() {
        let lifetime = ApplicationLifetime::new();
        lifetime.notify_started().await.unwrap();
        lifetime.notify_stopped().await.unwrap();
        assert_eq!(lifetime.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn stopped_does_not_skip_stopping() {
        let lifetime = ApplicationLifetime::new();
        let (log, make) = recorder();
        lifetime.on_stopping(make("stopping"));
        lifetime.on_stopped(make("stopped"));

        lifetime.notify_started().await.unwrap();
        lifetime.notify_stopped().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["stopping", "stopped"]);
    }

    #[tokio::test]
    async fn stopping_before_start_is_rejected() {
        let lifetime = ApplicationLifetime::new();
        let err = lifetime.notify_stopping().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                signal: LifecycleSignal::Stopping,
                state: LifecycleState::NotStarted,
            }
        ));
        assert_eq!(lifetime.state(), LifecycleState::NotStarted);
    }

    #[tokio::test]
    async fn failing_callbacks_do_not_block_others() {
        let lifetime = ApplicationLifetime::new();
        let (log, make) = recorder();

        lifetime.on_started(|| panic!("boom"));
        lifetime.on_async(LifecycleSignal::Started, "fails", || async {
            Err::<(), _>(LifecycleError::timeout("test", "failed on purpose"))
        });
        lifetime.on_async(LifecycleSignal::Started, "panics", || async {
            let missing: Option<()> = None;
            missing.expect("async boom");
            Ok::<(), LifecycleError>(())
        });
        lifetime.on_started(make("survivor"));
        lifetime.on_stopping(make("stopping"));

        lifetime.notify_started().await.unwrap();
        lifetime.notify_stopping().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["survivor", "stopping"]);
    }

    #[tokio::test]
    async fn late_registration_runs_immediately() {
        let lifetime = ApplicationLifetime::new();
        lifetime.notify_started().await.unwrap();

        let (log, make) = recorder();
        lifetime.on_started(make("late"));
        lifetime.on_stopping(make("stopping"));

        assert_eq!(*log.lock().unwrap(), vec!["late"]);
        assert_eq!(lifetime.callback_count(LifecycleSignal::Started), 0);
        assert_eq!(lifetime.callback_count(LifecycleSignal::Stopping), 1);
    }

    #[tokio::test]
    async fn stop_application_is_idempotent() {
        let lifetime = ApplicationLifetime::new();
        assert!(!lifetime.is_stop_requested());

        lifetime.stop_application();
        lifetime.stop_application();

        assert!(lifetime.is_stop_requested());
        tokio::time::timeout(Duration::from_secs(1), lifetime.stop_requested())
            .await
            .expect("stop request should be observable");
    }

    #[tokio::test]
    async fn stopped_timeout_is_reported() {
        let lifetime = ApplicationLifetime::new();
        lifetime.on_async(LifecycleSignal::Stopped, "slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), LifecycleError>(())
        });
        lifetime.notify_started().await.unwrap();

        let err = lifetime
            .notify_stopped_with_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { .. }));
    }
}
