use super::{log_response, validate_id};
use crate::AppState;
use crate::errors::{ApiError, ResourceKind};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use storage::types::Job;

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    validate_id(&id)?;

    match state.reader.get_job(&id).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::not_found(ResourceKind::Job, id)),
    }
}

pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    validate_id(&id)?;

    match state.reader.stream_logs(&id).await? {
        Some(logs) => Ok(log_response(logs)),
        None => Err(ApiError::not_found(ResourceKind::Job, id)),
    }
}
