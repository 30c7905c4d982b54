//! Request pipeline
//!
//! An ordered chain of [`Stage`]s ending in a [`Terminal`]. Each stage sees
//! the request on the way in, decides whether to delegate through [`Next`],
//! and sees it again on the way out, so stages nest like a call stack.

use crate::context::RequestContext;
use crate::di::Capability;
use async_trait::async_trait;
use std::sync::Arc;

mod builder;
mod fault;
pub mod stages;
mod terminal;

pub use builder::{Pipeline, PipelineBuilder};
pub use fault::HandlerFault;
pub(crate) use fault::write_error;
pub use terminal::{FnTerminal, NotFound, Terminal};

/// A type-erased error raised by a stage
pub type StageError = Box<dyn std::error::Error + Send + Sync>;

/// Standard return type for stages and terminals
pub type StageResult = Result<(), StageError>;

/// The remainder of the pipeline after the current stage
///
/// Consumed by [`run`](Next::run), so a stage can delegate at most once.
/// Dropping it without running is a short-circuit.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn Stage>], terminal: &'a dyn Terminal) -> Self {
        Self { stages, terminal }
    }

    /// Execute the rest of the pipeline
    ///
    /// Errors are attributed to the stage (or terminal) that raised them.
    pub async fn run(self, ctx: &mut RequestContext) -> StageResult {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                tracing::trace!(stage = stage.name(), remaining = rest.len(), "Entering stage");
                let next = Next::new(rest, self.terminal);
                stage
                    .handle(ctx, next)
                    .await
                    .map_err(|e| HandlerFault::attribute(stage.name(), e))
            }
            None => {
                tracing::trace!(terminal = self.terminal.name(), "Entering terminal");
                self.terminal
                    .respond(ctx)
                    .await
                    .map_err(|e| HandlerFault::attribute(self.terminal.name(), e))
            }
        }
    }

    /// Number of stages left before the terminal
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

/// The Stage trait
///
/// Stages can inspect/modify the request context before delegating, skip
/// delegation to answer the request themselves, and inspect/modify the
/// response after the rest of the pipeline returns.
///
/// # Example
/// ```
/// use hostkit::prelude::*;
///
/// struct Timing;
///
/// #[async_trait]
/// impl Stage for Timing {
///     async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
///         ctx.response_mut().write_line("before");
///         next.run(ctx).await?;
///         ctx.response_mut().write_line("after");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult;

    /// Used in logs and fault reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Capabilities this stage resolves from the request scope.
    ///
    /// Checked when the pipeline is built so a missing registration fails
    /// startup instead of the first request.
    fn dependencies(&self) -> Vec<Capability> {
        Vec::new()
    }
}
