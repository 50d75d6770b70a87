use crate::metrics_defs::BACKEND_ERRORS;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shared::counter;
use std::fmt;
use storage::reader::StorageError;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Build,
    Job,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Project => "project",
            ResourceKind::Build => "build",
            ResourceKind::Job => "job",
        };
        f.write_str(name)
    }
}

/// Client-facing description of a store failure. The full error, which
/// may name files or hosts, only goes to the log.
pub(crate) fn public_reason(err: &StorageError) -> &'static str {
    match err {
        StorageError::Io(_) => "store I/O error",
        StorageError::Decode { .. } => "store returned an unreadable record",
        StorageError::Timeout(_) => "store timed out",
        StorageError::Unavailable(_) => "store unavailable",
    }
}

/// Every store call result is classified into one of these before it
/// becomes a response.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] StorageError),

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl ApiError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error_message = match &self {
            // Not found carries no body
            ApiError::NotFound { .. } => return status.into_response(),
            ApiError::BackendUnavailable(e) => {
                counter!(BACKEND_ERRORS).increment(1);
                tracing::error!(error = %e, "Store call failed");
                format!("backend unavailable: {}", public_reason(e))
            }
            ApiError::MalformedRequest(reason) => {
                tracing::debug!(reason = %reason, "Rejected malformed request");
                self.to_string()
            }
        };

        let body = Json(ApiErrorResponse { error_message });

        (status, body).into_response()
    }
}
