//! Lifecycle-specific error types

use super::{LifecycleSignal, LifecycleState};
use thiserror::Error;

/// Errors that can occur during lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A transition was requested out of order
    #[error("Cannot fire {signal} while the application is {state}")]
    InvalidTransition {
        /// The signal that was requested
        signal: LifecycleSignal,
        /// The state the application was in
        state: LifecycleState,
    },

    /// A registered callback failed
    #[error("Callback '{callback}' failed during {signal}: {message}")]
    CallbackFailed {
        /// The signal being fired
        signal: LifecycleSignal,
        /// Name of the callback that failed
        callback: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Timeout during {phase}: {message}")]
    Timeout {
        /// The lifecycle phase where timeout occurred
        phase: String,
        /// Additional error message
        message: String,
    },
}

impl LifecycleError {
    /// Create a callback failure error
    pub fn callback_failed(
        signal: LifecycleSignal,
        callback: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CallbackFailed {
            signal,
            callback: callback.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
