use crate::config::HostConfig;
use crate::di::ServiceCollection;
use crate::error::Result;
use crate::lifecycle::ApplicationLifetime;
use crate::pipeline::PipelineBuilder;

/// Trait for application startup classes
///
/// A startup registers the services an application needs, then assembles
/// its pipeline and subscribes to lifecycle signals. Services are always
/// configured before the pipeline, so stages can rely on them.
///
/// # Example
/// ```
/// use hostkit::prelude::*;
/// use hostkit::pipeline::stages::RequestLogging;
///
/// struct AppStartup;
///
/// impl Startup for AppStartup {
///     fn configure_services(&self, services: &mut ServiceCollection, _config: &HostConfig) {
///         services.add_instance(String::from("hello"));
///     }
///
///     fn configure(&self, pipeline: &mut PipelineBuilder, lifetime: &ApplicationLifetime) -> Result<()> {
///         lifetime.on_started(|| tracing::info!("up"));
///         pipeline.use_stage(RequestLogging).run_fn(|ctx| {
///             let greeting = ctx.resolve::<String>()?;
///             ctx.response_mut().write(greeting.as_bytes());
///             Ok(())
///         });
///         Ok(())
///     }
/// }
/// ```
pub trait Startup: Send + Sync + 'static {
    /// Register services. The default registers nothing.
    fn configure_services(&self, services: &mut ServiceCollection, config: &HostConfig) {
        let _ = (services, config);
    }

    /// Assemble the pipeline and subscribe to lifecycle signals
    fn configure(&self, pipeline: &mut PipelineBuilder, lifetime: &ApplicationLifetime) -> Result<()>;
}
