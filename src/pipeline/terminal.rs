use crate::context::RequestContext;
use crate::di::Capability;
use crate::pipeline::StageResult;
use async_trait::async_trait;
use axum::http::StatusCode;

/// The sink invoked when the last stage delegates
#[async_trait]
pub trait Terminal: Send + Sync + 'static {
    async fn respond(&self, ctx: &mut RequestContext) -> StageResult;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Capabilities resolved from the request scope, validated at build time
    fn dependencies(&self) -> Vec<Capability> {
        Vec::new()
    }
}

/// Default terminal: `404 Not Found`
#[derive(Clone, Copy, Debug, Default)]
pub struct NotFound;

#[async_trait]
impl Terminal for NotFound {
    async fn respond(&self, ctx: &mut RequestContext) -> StageResult {
        ctx.response_mut().set_status(StatusCode::NOT_FOUND);
        Ok(())
    }
}

/// An inline terminal built from a closure
pub struct FnTerminal<F> {
    handler: F,
    dependencies: Vec<Capability>,
}

impl<F> FnTerminal<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            dependencies: Vec::new(),
        }
    }

    /// Declare a capability the closure resolves from the request scope
    pub fn requires(mut self, capability: Capability) -> Self {
        self.dependencies.push(capability);
        self
    }
}

#[async_trait]
impl<F> Terminal for FnTerminal<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
{
    async fn respond(&self, ctx: &mut RequestContext) -> StageResult {
        (self.handler)(ctx)
    }

    fn name(&self) -> &str {
        "inline terminal"
    }

    fn dependencies(&self) -> Vec<Capability> {
        self.dependencies.clone()
    }
}
