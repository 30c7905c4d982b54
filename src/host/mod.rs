//! Application host
//!
//! Ties the service registry, the pipeline and the lifecycle bus to an
//! HTTP listener.

mod service;
mod startup;

pub use service::PipelineService;
pub use startup::Startup;

use crate::config::HostConfig;
use crate::di::{ServiceCollection, ServiceProvider};
use crate::error::Result;
use crate::lifecycle::{ApplicationLifetime, ShutdownHandler};
use crate::pipeline::{Pipeline, PipelineBuilder};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

type ServicesStep = Box<dyn FnOnce(&mut ServiceCollection, &HostConfig) + Send>;
type PipelineStep = Box<dyn FnOnce(&mut PipelineBuilder, &ApplicationLifetime) -> Result<()> + Send>;

/// Builder for [`Host`]
///
/// Startups and closures are applied in the order they were added.
#[derive(Default)]
pub struct HostBuilder {
    config: Option<HostConfig>,
    services_steps: Vec<ServicesStep>,
    pipeline_steps: Vec<PipelineStep>,
    without_os_signals: bool,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit settings instead of reading the environment
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn startup<S: Startup>(self, startup: S) -> Self {
        let startup = Arc::new(startup);
        let for_pipeline = Arc::clone(&startup);
        self.configure_services(move |services, config| startup.configure_services(services, config))
            .configure(move |pipeline, lifetime| for_pipeline.configure(pipeline, lifetime))
    }

    pub fn configure_services<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut ServiceCollection, &HostConfig) + Send + 'static,
    {
        self.services_steps.push(Box::new(configure));
        self
    }

    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut PipelineBuilder, &ApplicationLifetime) -> Result<()> + Send + 'static,
    {
        self.pipeline_steps.push(Box::new(configure));
        self
    }

    /// Stop only through [`ApplicationLifetime::stop_application`]
    pub fn without_os_signals(mut self) -> Self {
        self.without_os_signals = true;
        self
    }

    /// Register services, build the registry, then build the pipeline
    ///
    /// # Errors
    /// Any configuration error aborts the build.
    pub fn build(self) -> Result<Host> {
        let config = match self.config {
            Some(config) => config,
            None => HostConfig::from_env()?,
        };
        let lifetime = Arc::new(ApplicationLifetime::new());

        let mut services = ServiceCollection::new();
        services.add_shared(Arc::clone(&lifetime));
        services.add_instance(config.clone());
        for step in self.services_steps {
            step(&mut services, &config);
        }
        let services = services.build();
        tracing::debug!(registrations = services.len(), "Service registry built");

        let mut pipeline = PipelineBuilder::new();
        pipeline.environment(config.environment);
        for step in self.pipeline_steps {
            step(&mut pipeline, &lifetime)?;
        }
        let pipeline = pipeline.build(&services)?;

        Ok(Host {
            config,
            lifetime,
            services,
            pipeline,
            without_os_signals: self.without_os_signals,
        })
    }
}

/// A built application, ready to serve
pub struct Host {
    config: HostConfig,
    lifetime: Arc<ApplicationLifetime>,
    services: ServiceProvider,
    pipeline: Pipeline,
    without_os_signals: bool,
}

impl Host {
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn lifetime(&self) -> Arc<ApplicationLifetime> {
        Arc::clone(&self.lifetime)
    }

    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The pipeline as a tower service, for embedding or testing
    pub fn service(&self) -> PipelineService {
        PipelineService::new(
            self.pipeline.clone(),
            self.services.clone(),
            self.config.max_body_bytes,
        )
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(self) -> Result<()> {
        let addr = self.config.addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.run_with_listener(listener).await
    }

    /// Serve an already bound listener until shutdown
    ///
    /// Fires Started once serving, Stopping when a shutdown signal or stop
    /// request arrives, and Stopped after in-flight requests have drained.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let router = Router::new().fallback_service(self.service());

        self.lifetime.notify_started().await?;
        tracing::info!("Listening on http://{}", addr);

        let mut shutdown = ShutdownHandler::new(Arc::clone(&self.lifetime));
        if self.without_os_signals {
            shutdown = shutdown.without_os_signals();
        }

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.wait_for_shutdown().await;
            })
            .await;
        if let Err(e) = &served {
            tracing::error!("Server error: {}", e);
        }

        tracing::info!("Connections drained");
        match self.config.stopped_timeout {
            Some(timeout) => self.lifetime.notify_stopped_with_timeout(timeout).await?,
            None => self.lifetime.notify_stopped().await?,
        };
        tracing::info!("Application stopped");

        served.map_err(Into::into)
    }
}
