use crate::context::RequestContext;
use crate::pipeline::{Next, Stage, StageResult};
use async_trait::async_trait;

/// Echoes the request id on the response.
///
/// An incoming header of the same name is kept, so ids survive proxies.
#[derive(Clone, Debug)]
pub struct RequestIdHeader {
    header: String,
}

impl RequestIdHeader {
    pub const DEFAULT_HEADER: &'static str = "x-request-id";

    pub fn new() -> Self {
        Self::with_header(Self::DEFAULT_HEADER)
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl Default for RequestIdHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for RequestIdHeader {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
        let id = match ctx.headers().get(&self.header) {
            Some(incoming) => incoming.to_string(),
            None => ctx.id().to_string(),
        };

        let result = next.run(ctx).await;
        ctx.response_mut().headers_mut().insert(self.header.as_str(), id);
        result
    }

    fn name(&self) -> &str {
        "request id"
    }
}
