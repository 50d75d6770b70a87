use super::{log_response, validate_id};
use crate::AppState;
use crate::errors::{ApiError, ResourceKind};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use storage::types::{Build, Job, LogStream};

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Build>, ApiError> {
    validate_id(&id)?;
    find_build(&state, &id).await.map(Json)
}

pub async fn jobs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Job>>, ApiError> {
    validate_id(&id)?;
    let build = find_build(&state, &id).await?;
    let jobs = state.reader.list_jobs(&id).await?;

    Ok(Json(order_jobs(&build, jobs)))
}

/// Concatenates the logs of every job of the build, in job order. Each
/// job's stream is only opened once the previous one is exhausted.
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    validate_id(&id)?;
    let build = find_build(&state, &id).await?;
    let jobs = order_jobs(&build, state.reader.list_jobs(&id).await?);

    let reader = state.reader.clone();
    let logs: LogStream = stream::iter(jobs)
        .then(move |job| {
            let reader = reader.clone();
            async move { reader.stream_logs(&job.id).await }
        })
        .flat_map(|opened| match opened {
            Ok(Some(logs)) => logs,
            Ok(None) => stream::empty().boxed(),
            Err(e) => stream::iter([Err(e)]).boxed(),
        })
        .boxed();

    Ok(log_response(logs))
}

async fn find_build(state: &AppState, id: &str) -> Result<Build, ApiError> {
    state
        .reader
        .get_build(id)
        .await?
        .ok_or_else(|| ApiError::not_found(ResourceKind::Build, id))
}

/// Jobs listed in the build's `job_ids` come first, in that order. Any
/// other job of the build follows, ordered by `(created, id)`.
fn order_jobs(build: &Build, mut jobs: Vec<Job>) -> Vec<Job> {
    let position: HashMap<&str, usize> = build
        .job_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    jobs.sort_by(|a, b| {
        let rank = |job: &Job| position.get(job.id.as_str()).copied().unwrap_or(usize::MAX);
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.created.cmp(&b.created))
            .then_with(|| a.id.cmp(&b.id))
    });
    jobs
}
