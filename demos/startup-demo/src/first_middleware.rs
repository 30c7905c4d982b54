use hostkit::prelude::*;

/// Writes a marker before and after the rest of the pipeline
pub struct FirstMiddleware;

#[async_trait]
impl Stage for FirstMiddleware {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
        ctx.response_mut().write_line("First middleware: before");
        next.run(ctx).await?;
        ctx.response_mut().write_line("First middleware: after");
        Ok(())
    }

    fn name(&self) -> &str {
        "first middleware"
    }
}
