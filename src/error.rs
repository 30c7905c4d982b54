use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

/// Errors raised while assembling or running a host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// True when the error is a startup-time misconfiguration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, HostError::Configuration(_))
    }
}

/// Startup-time configuration mistakes. These abort the host before any
/// request is served.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Capability not registered: {capability}{}", required_by_suffix(.required_by))]
    MissingCapability {
        capability: String,
        required_by: Option<String>,
    },

    #[error("Stage not registered: {stage}")]
    StageNotRegistered { stage: String },

    #[error("Scope mismatch: {message}")]
    ScopeMismatch { message: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(owner) => format!(" (required by {})", owner),
        None => String::new(),
    }
}

impl ConfigurationError {
    pub fn missing(capability: impl Into<String>) -> Self {
        Self::MissingCapability {
            capability: capability.into(),
            required_by: None,
        }
    }

    pub fn missing_for(capability: impl Into<String>, required_by: impl Into<String>) -> Self {
        Self::MissingCapability {
            capability: capability.into(),
            required_by: Some(required_by.into()),
        }
    }

    pub fn scope_mismatch(message: impl Into<String>) -> Self {
        Self::ScopeMismatch {
            message: message.into(),
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
