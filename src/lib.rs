//! # hostkit
//!
//! A small application host for Rust: an ordered request pipeline, lifecycle
//! signals and a typed service registry, served over HTTP with axum.
//!
//! ## Features
//!
//! - **Request Pipeline**: Stages see the request in registration order and the
//!   response in reverse; any stage can answer on its own
//! - **Lifecycle Signals**: Started, Stopping and Stopped callbacks plus a
//!   programmatic graceful stop
//! - **Service Registry**: Transient, Scoped and Singleton lifetimes keyed by
//!   type, including `dyn Trait` capabilities
//! - **Startup Validation**: Missing or mis-scoped capabilities fail the build,
//!   not the first request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostkit::prelude::*;
//! use hostkit::pipeline::stages::RequestLogging;
//!
//! trait UserLogic: Send + Sync {
//!     fn name(&self) -> String;
//! }
//!
//! struct Anonymous;
//!
//! impl UserLogic for Anonymous {
//!     fn name(&self) -> String {
//!         "stranger".to_string()
//!     }
//! }
//!
//! struct AppStartup;
//!
//! impl Startup for AppStartup {
//!     fn configure_services(&self, services: &mut ServiceCollection, _config: &HostConfig) {
//!         services.add_scoped(|_| Ok(Arc::new(Anonymous) as Arc<dyn UserLogic>));
//!     }
//!
//!     fn configure(&self, pipeline: &mut PipelineBuilder, lifetime: &ApplicationLifetime) -> Result<()> {
//!         lifetime.on_started(|| tracing::info!("Ready"));
//!         pipeline.use_stage(RequestLogging).run_fn(|ctx| {
//!             let users = ctx.resolve::<dyn UserLogic>()?;
//!             ctx.response_mut().write_line(format!("Hello, {}", users.name()));
//!             Ok(())
//!         });
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     Host::builder().startup(AppStartup).build()?.run().await
//! }
//! ```

extern crate self as hostkit;

pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod pipeline;

// Re-export core types
pub use config::{ConfigService, Environment, HostConfig};
pub use context::RequestContext;
pub use di::{Capability, Injectable, Lifetime, ServiceCollection, ServiceProvider};
pub use error::{ConfigurationError, HostError, Result};
pub use host::{Host, HostBuilder, Startup};
pub use lifecycle::{ApplicationLifetime, LifecycleSignal, LifecycleState};
pub use pipeline::{Next, Pipeline, PipelineBuilder, Stage, StageResult};

// Re-export macros
pub use hostkit_macro::Injectable as DeriveInjectable;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use hostkit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::DeriveInjectable as Injectable;
    pub use crate::config::{ConfigService, Environment, HostConfig};
    pub use crate::context::{Headers, RequestContext, ResponseBuffer};
    pub use crate::di::{
        Capability, Injectable, Lifetime, Resolver, Scope, ServiceCollection, ServiceProvider,
    };
    pub use crate::error::{ConfigurationError, HostError, Result};
    pub use crate::host::{Host, HostBuilder, PipelineService, Startup};
    pub use crate::lifecycle::{
        ApplicationLifetime, LifecycleError, LifecycleSignal, LifecycleState, ShutdownHandler,
        StoppingToken, shutdown_signal,
    };
    pub use crate::pipeline::{
        FnTerminal, HandlerFault, Next, NotFound, Pipeline, PipelineBuilder, Stage, StageError,
        StageResult, Terminal,
    };
    pub use async_trait::async_trait;
    pub use axum::http::{Method, StatusCode};
    pub use std::sync::Arc;
}
