//! Read-only resource handlers. Each one validates its path parameter,
//! calls the reader, and classifies the outcome into an `ApiError` before
//! anything reaches the client.

pub mod build;
pub mod health;
pub mod job;
pub mod project;

use crate::errors::ApiError;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::Response;
use futures::TryStreamExt;
use storage::types::{LogStream, is_valid_resource_id};

const LOG_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub(crate) fn validate_id(id: &str) -> Result<(), ApiError> {
    if is_valid_resource_id(id) {
        Ok(())
    } else {
        Err(ApiError::MalformedRequest(format!("invalid identifier {id:?}")))
    }
}

/// Streams log output to the client as it is read. A storage error after
/// the headers went out can only abort the body.
pub(crate) fn log_response(logs: LogStream) -> Response {
    let logs = logs.inspect_err(|e| tracing::warn!(error = %e, "Log stream aborted"));

    let mut response = Response::new(Body::from_stream(logs));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(LOG_CONTENT_TYPE));
    response
}
