use crate::config::Environment;
use crate::context::{RequestContext, ResponseBuffer};
use crate::di::{Capability, Injectable, Lifetime, Resolver, ServiceProvider};
use crate::error::{ConfigurationError, Result};
use crate::pipeline::fault::{self, HandlerFault, Panicked};
use crate::pipeline::{FnTerminal, Next, NotFound, Stage, StageResult, Terminal};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

type Construct = fn(&Resolver<'_>) -> Result<Arc<dyn Stage>>;
type Lookup = fn(&ServiceProvider) -> Result<Arc<dyn Stage>>;

#[derive(Clone)]
enum StageSlot {
    Instance(Arc<dyn Stage>),
    Injected {
        name: &'static str,
        dependencies: Vec<Capability>,
        construct: Construct,
    },
    Registered {
        capability: Capability,
        lookup: Lookup,
    },
}

fn construct_injected<S: Stage + Injectable>(resolver: &Resolver<'_>) -> Result<Arc<dyn Stage>> {
    Ok(Arc::new(S::inject(resolver)?))
}

fn lookup_registered<S: Stage>(provider: &ServiceProvider) -> Result<Arc<dyn Stage>> {
    let stage: Arc<S> = provider.resolve::<S>()?;
    Ok(stage)
}

impl StageSlot {
    fn materialize(&self, services: &ServiceProvider) -> Result<Arc<dyn Stage>> {
        match self {
            StageSlot::Instance(stage) => Ok(Arc::clone(stage)),
            StageSlot::Injected {
                name,
                dependencies,
                construct,
            } => {
                services.validate(dependencies, name)?;
                for dependency in dependencies {
                    if services.lifetime_of(dependency) == Some(Lifetime::Scoped) {
                        return Err(ConfigurationError::scope_mismatch(format!(
                            "stage '{}' is built once but depends on scoped capability '{}'; \
                             resolve it from the request context instead",
                            name, dependency
                        ))
                        .into());
                    }
                }
                construct(&Resolver::root(services))
            }
            StageSlot::Registered { capability, lookup } => {
                match services.lifetime_of(capability) {
                    None => Err(ConfigurationError::StageNotRegistered {
                        stage: capability.name().to_string(),
                    }
                    .into()),
                    Some(Lifetime::Scoped) => Err(ConfigurationError::scope_mismatch(format!(
                        "stage '{}' is registered as scoped but pipeline stages are built once",
                        capability
                    ))
                    .into()),
                    Some(_) => lookup(services),
                }
            }
        }
    }
}

/// Assembles stages into a [`Pipeline`]
///
/// Registration order is the order stages see the request; they see the
/// response in reverse.
///
/// # Example
/// ```
/// use hostkit::prelude::*;
/// use hostkit::pipeline::stages::{Flow, Hook};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let services = ServiceCollection::new().build();
/// let pipeline = PipelineBuilder::new()
///     .use_stage(Hook::new("greeting").before(|ctx| {
///         ctx.response_mut().write_line("hello");
///         Flow::Continue
///     }))
///     .run_fn(|ctx| {
///         let path = ctx.path().to_string();
///         ctx.response_mut().write_line(path);
///         Ok(())
///     })
///     .build(&services)
///     .unwrap();
///
/// let response = pipeline.handle(pipeline_context(&services, "/world")).await;
/// assert_eq!(response.text(), "hello\n/world\n");
/// # }
/// # fn pipeline_context(services: &ServiceProvider, path: &str) -> RequestContext {
/// #     RequestContext::new(Method::GET, path, services.create_scope())
/// # }
/// ```
pub struct PipelineBuilder {
    slots: Vec<StageSlot>,
    terminal: Option<Arc<dyn Terminal>>,
    environment: Environment,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            terminal: None,
            environment: Environment::default(),
        }
    }

    /// Append a constructed stage
    pub fn use_stage<S: Stage>(&mut self, stage: S) -> &mut Self {
        self.slots.push(StageSlot::Instance(Arc::new(stage)));
        self
    }

    /// Append an already shared stage
    pub fn use_shared(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.slots.push(StageSlot::Instance(stage));
        self
    }

    /// Append a stage constructed at build time from the registry
    ///
    /// Its dependencies must be registered and must not be scoped.
    pub fn use_injected<S: Stage + Injectable>(&mut self) -> &mut Self {
        self.slots.push(StageSlot::Injected {
            name: std::any::type_name::<S>(),
            dependencies: <S as Injectable>::dependencies(),
            construct: construct_injected::<S>,
        });
        self
    }

    /// Append a stage that is itself registered in the registry
    pub fn use_registered<S: Stage>(&mut self) -> &mut Self {
        self.slots.push(StageSlot::Registered {
            capability: Capability::of::<S>(),
            lookup: lookup_registered::<S>,
        });
        self
    }

    /// Set the terminal
    pub fn run<T: Terminal>(&mut self, terminal: T) -> &mut Self {
        self.terminal = Some(Arc::new(terminal));
        self
    }

    /// Set an inline terminal
    pub fn run_fn<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.run(FnTerminal::new(handler))
    }

    /// Choose how much fault detail error responses carry
    pub fn environment(&mut self, environment: Environment) -> &mut Self {
        self.environment = environment;
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Build the pipeline, validating every declared capability
    ///
    /// # Errors
    /// Returns a configuration error if a stage or the terminal depends on an
    /// unregistered capability, if a build-time stage depends on a scoped
    /// capability, or if a registered stage is missing.
    pub fn build(&self, services: &ServiceProvider) -> Result<Pipeline> {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let stage = slot.materialize(services)?;
            services.validate(&stage.dependencies(), stage.name())?;
            tracing::debug!(index = stages.len(), stage = stage.name(), "Stage registered");
            stages.push(stage);
        }

        let terminal: Arc<dyn Terminal> = match &self.terminal {
            Some(terminal) => Arc::clone(terminal),
            None => Arc::new(NotFound),
        };
        services.validate(&terminal.dependencies(), terminal.name())?;

        tracing::info!(
            stages = stages.len(),
            terminal = terminal.name(),
            environment = %self.environment,
            "Pipeline built"
        );

        Ok(Pipeline {
            stages: stages.into(),
            terminal,
            environment: self.environment,
        })
    }
}

/// An immutable, composed pipeline
///
/// Cheap to clone; all clones share the same stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
    terminal: Arc<dyn Terminal>,
    environment: Environment,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run one request through the pipeline
    ///
    /// Faults never escape, panics included: they are logged and turned
    /// into an error response for this request.
    pub async fn execute(&self, ctx: &mut RequestContext) {
        let span = tracing::debug_span!(
            "request",
            request_id = %ctx.id(),
            method = %ctx.method(),
            path = %ctx.path()
        );

        let next = Next::new(&self.stages, self.terminal.as_ref());
        let outcome = AssertUnwindSafe(next.run(ctx).instrument(span))
            .catch_unwind()
            .await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(payload) => Some(Panicked::from_payload(payload).into()),
        };

        if let Some(error) = error {
            let fault = HandlerFault::from_error(error);
            tracing::error!(
                request_id = %ctx.id(),
                method = %ctx.method(),
                path = %ctx.path(),
                stage = fault.stage(),
                error = %fault.inner(),
                "Request handler failed"
            );
            fault::write_fault(ctx, &fault, self.environment);
        }
    }

    /// Run `ctx` through the pipeline and return the finished response
    pub async fn handle(&self, mut ctx: RequestContext) -> ResponseBuffer {
        self.execute(&mut ctx).await;
        ctx.into_response()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::di::ServiceCollection;
    use crate::error::HostError;
    use crate::pipeline::stages::{Flow, Hook};
    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};

    struct Marker(&'static str);

    #[async_trait]
    impl Stage for Marker {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
            ctx.response_mut().write_line(format!("{}-before", self.0));
            next.run(ctx).await?;
            ctx.response_mut().write_line(format!("{}-after", self.0));
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct Needs;

    trait Clock: Send + Sync {}

    #[async_trait]
    impl Stage for Needs {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
            ctx.resolve::<dyn Clock>()?;
            next.run(ctx).await
        }

        fn dependencies(&self) -> Vec<Capability> {
            vec![Capability::of::<dyn Clock>()]
        }
    }

    fn request(services: &ServiceProvider, path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path, services.create_scope())
    }

    #[tokio::test]
    async fn empty_pipeline_falls_through_to_not_found() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new().build(&services).unwrap();

        assert!(pipeline.is_empty());
        let response = pipeline.handle(request(&services, "/anything")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stages_nest_in_registration_order() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(Marker("1"))
            .use_stage(Marker("2"))
            .use_stage(Marker("3"))
            .run_fn(|ctx| {
                ctx.response_mut().write_line("terminal");
                Ok(())
            })
            .build(&services)
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["1", "2", "3"]);
        let response = pipeline.handle(request(&services, "/")).await;
        assert_eq!(
            response.text(),
            "1-before\n2-before\n3-before\nterminal\n3-after\n2-after\n1-after\n"
        );
    }

    #[tokio::test]
    async fn hook_short_circuit_skips_later_stages() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(Marker("outer"))
            .use_stage(Hook::new("gate").before(|ctx| {
                ctx.response_mut().write_line("stopped");
                Flow::Respond
            }))
            .use_stage(Marker("inner"))
            .build(&services)
            .unwrap();

        let response = pipeline.handle(request(&services, "/")).await;
        assert_eq!(response.text(), "outer-before\nstopped\nouter-after\n");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_dependency_fails_at_build_time() {
        let services = ServiceProvider::empty();
        let err = PipelineBuilder::new()
            .use_stage(Needs)
            .build(&services)
            .err()
            .unwrap();

        match err {
            HostError::Configuration(ConfigurationError::MissingCapability {
                capability,
                required_by,
            }) => {
                assert!(capability.contains("Clock"));
                assert!(required_by.unwrap().contains("Needs"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unregistered_stage_is_reported() {
        let services = ServiceProvider::empty();
        let err = PipelineBuilder::new()
            .use_registered::<Needs>()
            .build(&services)
            .err()
            .unwrap();

        assert!(matches!(
            err,
            HostError::Configuration(ConfigurationError::StageNotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn scoped_stage_registration_is_rejected() {
        let mut services = ServiceCollection::new();
        services.add_scoped(|_| Ok(Arc::new(Marker("scoped"))));
        let services = services.build();

        let err = PipelineBuilder::new()
            .use_registered::<Marker>()
            .build(&services)
            .err()
            .unwrap();

        assert!(matches!(
            err,
            HostError::Configuration(ConfigurationError::ScopeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn registered_singleton_stage_is_used() {
        let mut services = ServiceCollection::new();
        services.add_singleton(|_| Ok(Arc::new(Marker("shared"))));
        let services = services.build();

        let pipeline = PipelineBuilder::new()
            .use_registered::<Marker>()
            .build(&services)
            .unwrap();

        let response = pipeline.handle(request(&services, "/")).await;
        assert_eq!(response.text(), "shared-before\nshared-after\n");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stage_errors_become_500_for_that_request_only() {
        struct Flaky;

        #[async_trait]
        impl Stage for Flaky {
            async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
                if ctx.path() == "/fail" {
                    return Err("exploded".into());
                }
                next.run(ctx).await
            }

            fn name(&self) -> &str {
                "flaky"
            }
        }

        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(Marker("outer"))
            .use_stage(Flaky)
            .run_fn(|ctx| {
                ctx.response_mut().write_line("ok");
                Ok(())
            })
            .environment(Environment::Development)
            .build(&services)
            .unwrap();

        let failed = pipeline.handle(request(&services, "/fail")).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(failed.body()).unwrap();
        assert_eq!(body["message"], "Stage 'flaky' failed: exploded");

        let fine = pipeline.handle(request(&services, "/ok")).await;
        assert_eq!(fine.status(), StatusCode::OK);
        assert_eq!(fine.text(), "outer-before\nok\nouter-after\n");
    }

    struct Explosive;

    #[async_trait]
    impl Stage for Explosive {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> StageResult {
            if ctx.path() == "/boom" {
                panic!("stage exploded");
            }
            next.run(ctx).await
        }
    }

    #[tokio::test]
    async fn panicking_stage_becomes_500_for_that_request_only() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(Marker("outer"))
            .use_stage(Explosive)
            .run_fn(|ctx| {
                ctx.response_mut().write_line("ok");
                Ok(())
            })
            .environment(Environment::Development)
            .build(&services)
            .unwrap();

        let failed = pipeline.handle(request(&services, "/boom")).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(failed.body()).unwrap();
        assert_eq!(
            body["message"],
            "Stage 'pipeline' failed: panicked: stage exploded"
        );

        let fine = pipeline.handle(request(&services, "/fine")).await;
        assert_eq!(fine.status(), StatusCode::OK);
        assert_eq!(fine.text(), "outer-before\nok\nouter-after\n");
    }

    #[tokio::test]
    async fn panicking_terminal_hides_detail_in_production() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .run_fn(|_| panic!("terminal exploded"))
            .build(&services)
            .unwrap();

        let response = pipeline.handle(request(&services, "/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.text().contains("exploded"));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_pipeline() {
        let services = ServiceProvider::empty();
        let pipeline = PipelineBuilder::new()
            .use_stage(Marker("m"))
            .run_fn(|ctx| {
                let path = ctx.path().to_string();
                ctx.response_mut().write_line(path);
                Ok(())
            })
            .build(&services)
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let pipeline = pipeline.clone();
            let ctx = request(&services, &format!("/{i}"));
            handles.push(tokio::spawn(async move { pipeline.handle(ctx).await }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let response = handle.await.unwrap();
            assert_eq!(response.text(), format!("m-before\n/{i}\nm-after\n"));
        }
    }
}
