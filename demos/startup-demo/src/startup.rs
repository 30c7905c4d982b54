use crate::first_middleware::FirstMiddleware;
use crate::user_logic::{RequestUserLogic, UserLogic};
use hostkit::pipeline::stages::{Flow, Hook, RequestIdHeader, RequestLogging};
use hostkit::prelude::*;
use std::time::Duration;

pub struct DemoStartup {
    /// Simulated drain work run when Stopped fires
    pub stopped_delay: Duration,
}

impl Startup for DemoStartup {
    fn configure_services(&self, services: &mut ServiceCollection, config: &HostConfig) {
        tracing::debug!(environment = %config.environment, "Registering demo services");
        RequestUserLogic::register(services);
    }

    fn configure(&self, pipeline: &mut PipelineBuilder, lifetime: &ApplicationLifetime) -> Result<()> {
        lifetime.on_started(|| tracing::info!("Application started"));
        lifetime.on_stopping(|| tracing::info!("Application stopping"));

        let delay = self.stopped_delay;
        lifetime.on_async(LifecycleSignal::Stopped, "drain", move || async move {
            tokio::time::sleep(delay).await;
            tracing::info!("Application stopped after {:?}", delay);
            Ok::<(), LifecycleError>(())
        });

        pipeline
            .use_stage(RequestLogging)
            .use_stage(RequestIdHeader::new())
            .use_stage(shutdown_endpoint())
            .use_stage(FirstMiddleware)
            .run(
                FnTerminal::new(|ctx| {
                    let users = ctx.resolve::<dyn UserLogic>()?;
                    let line = format!("Hello, {}!", users.get_user_name());
                    ctx.response_mut().write_line(line);
                    Ok(())
                })
                .requires(Capability::of::<dyn UserLogic>()),
            );
        Ok(())
    }
}

/// `/shutdown` answers immediately and asks the host to stop
fn shutdown_endpoint() -> Hook {
    Hook::new("shutdown endpoint").before(|ctx| {
        if ctx.path() != "/shutdown" {
            return Flow::Continue;
        }
        match ctx.resolve::<ApplicationLifetime>() {
            Ok(lifetime) => {
                lifetime.stop_application();
                ctx.response_mut()
                    .set_status(StatusCode::ACCEPTED)
                    .write_line("Shutting down");
            }
            Err(e) => {
                tracing::error!("Lifetime unavailable: {}", e);
                ctx.response_mut().set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
        Flow::Respond
    })
}
