use super::validate_id;
use crate::AppState;
use crate::aggregator::{ProjectBuildSummary, sort_latest_first};
use crate::errors::{ApiError, ResourceKind};
use axum::Json;
use axum::extract::{Path, State};
use storage::types::{Build, Project};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.reader.list_projects().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    validate_id(&id)?;

    match state.reader.get_project(&id).await? {
        Some(project) => Ok(Json(project)),
        None => Err(ApiError::not_found(ResourceKind::Project, id)),
    }
}

/// Builds of one project, most recent first.
pub async fn builds(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Build>>, ApiError> {
    validate_id(&id)?;

    if state.reader.get_project(&id).await?.is_none() {
        return Err(ApiError::not_found(ResourceKind::Project, id));
    }

    let mut builds = state.reader.list_builds(&id).await?;
    builds.retain(|build| build.project_id == id);
    sort_latest_first(&mut builds);

    Ok(Json(builds))
}

pub async fn list_with_latest_build(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectBuildSummary>>, ApiError> {
    Ok(Json(state.aggregator.summarize().await?))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::testutils::{RecordingSink, build, get, project, test_config, test_router};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use storage::deadline::DeadlineReader;
    use storage::memory::MemoryReader;

    fn reader() -> MemoryReader {
        MemoryReader::new()
            .with_project(project("p1"))
            .with_project(project("p2"))
            .with_build(build("b1", "p1", 100))
            .with_build(build("b2", "p1", 200))
            .with_build(build("b0", "p1", 200))
    }

    fn ids(value: &serde_json::Value) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_and_get_projects() {
        let (router, _) = test_router(Arc::new(reader()));

        let response = get(&router, "/v1/projects").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(ids(&response.json()), ["p1", "p2"]);

        let response = get(&router, "/v1/project/p2").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["secrets_ref"], "p2-secrets");

        let response = get(&router, "/v1/project/p3").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_project_builds_latest_first() {
        let (router, _) = test_router(Arc::new(reader()));

        let response = get(&router, "/v1/project/p1/builds").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(ids(&response.json()), ["b2", "b0", "b1"]);

        let response = get(&router, "/v1/project/p2/builds").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), json!([]));

        let response = get(&router, "/v1/project/p3/builds").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_projects_with_latest_build() {
        let reader = reader()
            .with_project(project("p3"))
            .fail_build_listing("p3");
        let (router, _) = test_router(Arc::new(reader));

        let response = get(&router, "/v1/projects-build").await;
        assert_eq!(response.status, StatusCode::OK);

        let body = response.json();
        let summaries = body.as_array().unwrap();
        assert_eq!(summaries.len(), 3);

        assert_eq!(summaries[0]["project"]["id"], "p1");
        assert_eq!(summaries[0]["latest_build_state"], "found");
        assert_eq!(summaries[0]["last_build"]["id"], "b2");

        assert_eq!(summaries[1]["project"]["id"], "p2");
        assert_eq!(summaries[1]["latest_build_state"], "no_build");
        assert!(summaries[1].get("last_build").is_none());

        assert_eq!(summaries[2]["project"]["id"], "p3");
        assert_eq!(summaries[2]["latest_build_state"], "lookup_failed");
        assert_eq!(summaries[2]["error"], "store unavailable");
        assert!(!response.text().contains("build listing for p3 failed"));
    }

    #[tokio::test]
    async fn test_project_listing_failure_fails_summary() {
        let reader = Arc::new(reader());
        let (router, _) = test_router(reader.clone());
        reader.set_unavailable(true);

        for uri in ["/v1/projects", "/v1/projects-build", "/v1/project/p1"] {
            let response = get(&router, uri).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_store_timeout_is_service_unavailable() {
        let slow = reader().with_delay(Duration::from_secs(30));
        let reader = DeadlineReader::new(slow, Duration::from_millis(5));
        let sink = Arc::new(RecordingSink::default());
        let router = build_router(Arc::new(reader), &test_config(), sink.clone());

        // The record exists but the store does not answer in time
        for uri in ["/v1/project/p1", "/v1/projects", "/v1/projects-build"] {
            let response = get(&router, uri).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert_eq!(
                response.json()["error_message"],
                "backend unavailable: store timed out"
            );
        }
        assert_eq!(sink.entries().len(), 3);
        assert!(sink.entries().iter().all(|entry| entry.status == 503));
    }
}
