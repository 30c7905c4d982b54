use crate::config::Environment;
use crate::context::{RequestContext, ResponseBuffer};
use crate::lifecycle::panic_message;
use crate::pipeline::StageError;
use axum::http::StatusCode;
use serde::Serialize;
use std::any::Any;
use thiserror::Error;
use uuid::Uuid;

/// A stage failed while processing one request.
///
/// The pipeline's error boundary turns it into a 500 for that request only.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {source}")]
pub struct HandlerFault {
    stage: String,
    source: StageError,
}

impl HandlerFault {
    pub fn new(stage: impl Into<String>, source: StageError) -> Self {
        Self {
            stage: stage.into(),
            source,
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.source
    }

    /// Tag `error` with the stage that raised it, unless an inner stage already did
    pub(crate) fn attribute(stage: &str, error: StageError) -> StageError {
        if error.is::<HandlerFault>() {
            error
        } else {
            Box::new(HandlerFault::new(stage, error))
        }
    }

    pub(crate) fn from_error(error: StageError) -> Self {
        match error.downcast::<HandlerFault>() {
            Ok(fault) => *fault,
            Err(other) => HandlerFault::new("pipeline", other),
        }
    }
}

/// A stage or terminal panicked instead of returning an error
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub(crate) struct Panicked(String);

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self(panic_message(payload))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    message: &'a str,
    request_id: String,
    timestamp: String,
}

/// Replace the response with a JSON error document
pub(crate) fn write_error(
    response: &mut ResponseBuffer,
    status: StatusCode,
    message: &str,
    request_id: Uuid,
) {
    let body = ErrorBody {
        status_code: status.as_u16(),
        message,
        request_id: request_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    response.clear();
    response.set_status(status);
    match serde_json::to_vec(&body) {
        Ok(json) => {
            response
                .headers_mut()
                .insert("content-type", "application/json");
            response.write(json);
        }
        Err(e) => {
            tracing::warn!("Failed to serialize error body: {}", e);
            response.write(message);
        }
    }
}

/// Answer a faulted request; detail is only exposed in development
pub(crate) fn write_fault(ctx: &mut RequestContext, fault: &HandlerFault, environment: Environment) {
    let detail;
    let message = if environment.is_development() {
        detail = fault.to_string();
        detail.as_str()
    } else {
        "Internal Server Error"
    };
    let id = ctx.id();
    write_error(ctx.response_mut(), StatusCode::INTERNAL_SERVER_ERROR, message, id);
}
