//! Per-request state handed through the pipeline.

mod headers;
mod items;
mod response;

pub use headers::Headers;
pub use items::Items;
pub use response::ResponseBuffer;

use crate::di::{Scope, ServiceProvider};
use crate::error::Result;
use axum::body::Bytes;
use axum::http::Method;
use std::sync::Arc;
use uuid::Uuid;

/// One in-flight request and the response being built for it.
///
/// Owned by a single pipeline execution. Stages receive it by `&mut` for
/// the duration of their call, so nothing can hold on to it afterwards.
pub struct RequestContext {
    id: Uuid,
    method: Method,
    path: String,
    query: Option<String>,
    headers: Headers,
    body: Bytes,
    response: ResponseBuffer,
    items: Items,
    services: Scope,
}

impl RequestContext {
    /// Create a context whose scoped services come from `services`
    pub fn new(method: Method, path: impl Into<String>, services: Scope) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: None,
            headers: Headers::new(),
            body: Bytes::new(),
            response: ResponseBuffer::new(),
            items: Items::new(),
            services,
        }
    }

    /// Create a context backed by an empty registry
    pub fn detached(method: Method, path: impl Into<String>) -> Self {
        Self::new(method, path, ServiceProvider::empty().create_scope())
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn response(&self) -> &ResponseBuffer {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseBuffer {
        &mut self.response
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Items {
        &mut self.items
    }

    /// The request scope
    pub fn services(&self) -> &Scope {
        &self.services
    }

    /// Shorthand for `services().resolve::<T>()`
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.services.resolve::<T>()
    }

    pub(crate) fn into_response(self) -> ResponseBuffer {
        self.response
    }
}
