//! Lifecycle Signals
//!
//! This module provides the signal bus components use to observe the
//! application's lifetime and to request a graceful stop.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Configuration Loading
//!    ↓
//! 2. Service Registration
//!    ↓
//! 3. Pipeline Build (capabilities validated)
//!    ↓
//! 4. Listener Bound
//!    ↓
//! 5. Started                             ← Signal
//!    ↓
//! [Running...]
//!    ↓
//! 6. Shutdown Trigger (SIGTERM/SIGINT or stop_application)
//!    ↓
//! 7. Stopping                            ← Signal, StoppingToken trips
//!    ↓
//! 8. Graceful Drain
//!    ↓
//! 9. Stopped                             ← Signal
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hostkit::lifecycle::{ApplicationLifetime, LifecycleSignal};
//! use std::sync::Arc;
//!
//! let lifetime = Arc::new(ApplicationLifetime::new());
//! lifetime.on_started(|| tracing::info!("Accepting traffic"));
//! lifetime.on_async(LifecycleSignal::Stopped, "flush", || async {
//!     flush_buffers().await;
//!     Ok(())
//! });
//! ```

mod error;
mod lifetime;
mod shutdown;
mod token;

pub use error::{LifecycleError, Result};
pub use lifetime::{ApplicationLifetime, LifecycleSignal, LifecycleState};
pub(crate) use lifetime::panic_message;
pub use shutdown::{ShutdownHandler, ShutdownReason, shutdown_signal};
pub use token::StoppingToken;
