use crate::context::{Headers, RequestContext, ResponseBuffer};
use crate::di::ServiceProvider;
use crate::pipeline::{Pipeline, write_error};
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::Response;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::Service;

/// Tower service that runs every request through a [`Pipeline`]
///
/// Each call gets its own [`RequestContext`] and request scope. The service
/// never fails; faults are answered by the pipeline's error boundary.
#[derive(Clone)]
pub struct PipelineService {
    pipeline: Pipeline,
    services: ServiceProvider,
    max_body_bytes: usize,
}

impl PipelineService {
    pub fn new(pipeline: Pipeline, services: ServiceProvider, max_body_bytes: usize) -> Self {
        Self {
            pipeline,
            services,
            max_body_bytes,
        }
    }

    async fn respond(self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();

        let headers: Headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str(), value)),
                Err(_) => {
                    tracing::debug!(header = %name, "Skipping non-text request header");
                    None
                }
            })
            .collect();

        let mut ctx = RequestContext::new(parts.method, parts.uri.path(), self.services.create_scope())
            .with_headers(headers);
        if let Some(query) = parts.uri.query() {
            ctx = ctx.with_query(query);
        }

        match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => {
                ctx = ctx.with_body(bytes);
                self.pipeline.execute(&mut ctx).await;
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.id(),
                    limit = self.max_body_bytes,
                    "Rejecting request body: {}",
                    e
                );
                let id = ctx.id();
                write_error(ctx.response_mut(), StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large", id);
            }
        }

        into_http(ctx.into_response())
    }
}

impl Service<Request<Body>> for PipelineService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.respond(request).await) })
    }
}

fn into_http(buffer: ResponseBuffer) -> Response {
    let (status, headers, body) = buffer.into_parts();
    let has_body = !body.is_empty();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    for (name, value) in headers.iter() {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = name, "Dropping invalid response header"),
        }
    }

    if has_body && !response.headers().contains_key(CONTENT_TYPE) {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    response
}
