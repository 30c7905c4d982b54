use crate::context::RequestContext;
use crate::pipeline::{Next, Stage, StageResult};
use async_trait::async_trait;
use std::time::Instant;

/// A stage that logs request timing and status
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogging;

#[async_trait]
impl Stage for RequestLogging {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
        let method = ctx.method().clone();
        let path = ctx.path().to_string();
        let start = Instant::now();

        tracing::info!(request_id = %ctx.id(), "--> {} {}", method, path);

        match next.run(ctx).await {
            Ok(()) => {
                let status = ctx.response().status();
                tracing::info!(
                    request_id = %ctx.id(),
                    "<-- {} {} {} {:?}",
                    method,
                    path,
                    status,
                    start.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.id(),
                    "<-- {} {} ERROR: {} {:?}",
                    method,
                    path,
                    e,
                    start.elapsed()
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "request logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ServiceProvider;
    use crate::pipeline::PipelineBuilder;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn passes_the_response_through() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(RequestLogging)
            .run_fn(|ctx| {
                ctx.response_mut().set_status(StatusCode::CREATED).write("made");
                Ok(())
            })
            .build(&services)
            .unwrap();

        let ctx = RequestContext::new(Method::POST, "/things", services.create_scope());
        let response = pipeline.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.text(), "made");
    }

    #[tokio::test]
    async fn errors_are_propagated_unchanged() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(RequestLogging)
            .run_fn(|_| Err("boom".into()))
            .build(&services)
            .unwrap();

        let ctx = RequestContext::new(Method::GET, "/", services.create_scope());
        let response = pipeline.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
