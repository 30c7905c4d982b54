use crate::context::RequestContext;
use crate::pipeline::write_error;
use crate::pipeline::{Next, Stage, StageResult};
use async_trait::async_trait;
use axum::http::StatusCode;

/// Standard Result type for Guard
/// Ok(()) means allowed
/// Err(GuardError) means denied
pub type GuardResult = Result<(), GuardError>;

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::Forbidden(_) => StatusCode::FORBIDDEN,
            GuardError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

/// The Guard trait
/// Implement this to protect everything registered after it
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, ctx: &RequestContext) -> GuardResult;
}

/// Runs a [`Guard`] and answers denied requests with 401 or 403
pub struct GuardStage<G> {
    guard: G,
}

impl<G: Guard> GuardStage<G> {
    pub fn new(guard: G) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl<G: Guard> Stage for GuardStage<G> {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
        if let Err(denied) = self.guard.can_activate(ctx).await {
            tracing::debug!(request_id = %ctx.id(), path = ctx.path(), "Guard denied: {}", denied);
            let id = ctx.id();
            write_error(ctx.response_mut(), denied.status(), &denied.to_string(), id);
            return Ok(());
        }
        next.run(ctx).await
    }

    fn name(&self) -> &str {
        std::any::type_name::<G>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ServiceProvider;
    use crate::pipeline::PipelineBuilder;
    use axum::http::Method;

    struct BearerGuard;

    #[async_trait]
    impl Guard for BearerGuard {
        async fn can_activate(&self, ctx: &RequestContext) -> GuardResult {
            match ctx.headers().get("authorization") {
                None => Err(GuardError::Unauthorized("missing token".into())),
                Some("Bearer admin") => Ok(()),
                Some(_) => Err(GuardError::Forbidden("admin only".into())),
            }
        }
    }

    async fn call(authorization: Option<&str>) -> crate::context::ResponseBuffer {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(GuardStage::new(BearerGuard))
            .run_fn(|ctx| {
                ctx.response_mut().write("secret");
                Ok(())
            })
            .build(&services)
            .unwrap();

        let mut ctx = RequestContext::new(Method::GET, "/admin", services.create_scope());
        if let Some(value) = authorization {
            ctx = ctx.with_header("Authorization", value);
        }
        pipeline.handle(ctx).await
    }

    #[tokio::test]
    async fn allowed_requests_reach_the_terminal() {
        let response = call(Some("Bearer admin")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "secret");
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() {
        let response = call(None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["message"], "Unauthorized: missing token");
    }

    #[tokio::test]
    async fn wrong_credentials_are_forbidden() {
        let response = call(Some("Bearer guest")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.text().contains("secret"));
    }
}
