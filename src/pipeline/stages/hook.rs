use crate::context::RequestContext;
use crate::pipeline::{Next, Stage, StageResult};
use async_trait::async_trait;

/// What a [`Hook`]'s before phase decided
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Delegate to the rest of the pipeline
    Continue,
    /// The response is complete; skip everything after this stage
    Respond,
}

type Before = Box<dyn Fn(&mut RequestContext) -> Flow + Send + Sync>;
type After = Box<dyn Fn(&mut RequestContext) + Send + Sync>;

/// A stage assembled from synchronous closures
///
/// The after phase runs only when the before phase continued and the rest of
/// the pipeline succeeded.
pub struct Hook {
    name: String,
    before: Option<Before>,
    after: Option<After>,
}

impl Hook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    pub fn before<F>(mut self, before: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Flow + Send + Sync + 'static,
    {
        self.before = Some(Box::new(before));
        self
    }

    pub fn after<F>(mut self, after: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.after = Some(Box::new(after));
        self
    }
}

#[async_trait]
impl Stage for Hook {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
        if let Some(before) = &self.before {
            if before(ctx) == Flow::Respond {
                tracing::debug!(stage = %self.name, "Short-circuited");
                return Ok(());
            }
        }

        next.run(ctx).await?;

        if let Some(after) = &self.after {
            after(ctx);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ServiceProvider;
    use crate::pipeline::PipelineBuilder;
    use axum::http::{Method, StatusCode};

    fn echo_pipeline(hook: Hook) -> (ServiceProvider, crate::pipeline::Pipeline) {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(hook)
            .run_fn(|ctx| {
                ctx.response_mut().write_line("terminal");
                Ok(())
            })
            .build(&services)
            .unwrap();
        (services, pipeline)
    }

    #[tokio::test]
    async fn before_and_after_wrap_the_terminal() {
        let (services, pipeline) = echo_pipeline(
            Hook::new("wrap")
                .before(|ctx| {
                    ctx.response_mut().write_line("before");
                    Flow::Continue
                })
                .after(|ctx| {
                    ctx.response_mut().write_line("after");
                }),
        );

        let ctx = RequestContext::new(Method::GET, "/", services.create_scope());
        let response = pipeline.handle(ctx).await;
        assert_eq!(response.text(), "before\nterminal\nafter\n");
    }

    #[tokio::test]
    async fn respond_skips_terminal_and_own_after() {
        let (services, pipeline) = echo_pipeline(
            Hook::new("gate")
                .before(|ctx| {
                    ctx.response_mut()
                        .set_status(StatusCode::SERVICE_UNAVAILABLE)
                        .write_line("closed");
                    Flow::Respond
                })
                .after(|ctx| {
                    ctx.response_mut().write_line("after");
                }),
        );

        let ctx = RequestContext::new(Method::GET, "/", services.create_scope());
        let response = pipeline.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.text(), "closed\n");
    }

    #[tokio::test]
    async fn hook_without_phases_is_transparent() {
        let (services, pipeline) = echo_pipeline(Hook::new("noop"));

        let ctx = RequestContext::new(Method::GET, "/", services.create_scope());
        let response = pipeline.handle(ctx).await;
        assert_eq!(response.text(), "terminal\n");
        assert_eq!(pipeline.stage_names(), vec!["noop"]);
    }
}
