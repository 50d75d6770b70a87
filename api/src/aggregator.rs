//! Joins the project collection with each project's builds to produce one
//! "latest build" summary per project.
//!
//! The join is recomputed from the store on every call. Build listings run
//! concurrently, bounded by a per-call semaphore so a large number of
//! projects cannot flood the store. A failed listing degrades only the
//! summary of its own project.

use crate::errors::public_reason;
use crate::metrics_defs::BUILD_LOOKUP_FAILURES;
use serde::{Serialize, Serializer};
use shared::counter;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use storage::reader::{ResourceReader, StorageError};
use storage::types::{Build, Project};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Clone, Debug, PartialEq)]
pub enum LatestBuild {
    Found(Build),
    NoBuild,
    /// The build listing for this project failed; carries a client-safe reason.
    LookupFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectBuildSummary {
    pub project: Project,
    pub latest: LatestBuild,
}

#[derive(Serialize)]
struct SummaryView<'a> {
    project: &'a Project,
    latest_build_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_build: Option<&'a Build>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for ProjectBuildSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (latest_build_state, last_build, error) = match &self.latest {
            LatestBuild::Found(build) => ("found", Some(build), None),
            LatestBuild::NoBuild => ("no_build", None, None),
            LatestBuild::LookupFailed(reason) => ("lookup_failed", None, Some(reason.as_str())),
        };

        SummaryView {
            project: &self.project,
            latest_build_state,
            last_build,
            error,
        }
        .serialize(serializer)
    }
}

/// Orders builds by creation time, then by identifier.
pub fn compare_recency(a: &Build, b: &Build) -> Ordering {
    a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id))
}

/// Sorts builds most recent first.
pub fn sort_latest_first(builds: &mut [Build]) {
    builds.sort_by(|a, b| compare_recency(b, a));
}

/// Picks the most recent build owned by `project_id`. Builds whose owner
/// does not match are not considered.
pub fn select_latest(project_id: &str, builds: Vec<Build>) -> Option<Build> {
    builds
        .into_iter()
        .filter(|build| build.project_id == project_id)
        .max_by(compare_recency)
}

#[derive(Clone)]
pub struct Aggregator {
    reader: Arc<dyn ResourceReader>,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(reader: Arc<dyn ResourceReader>, max_concurrency: usize) -> Self {
        Aggregator {
            reader,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Returns one summary per project, in the order the store listed them.
    /// Fails only if the project listing itself fails.
    pub async fn summarize(&self) -> Result<Vec<ProjectBuildSummary>, StorageError> {
        let projects = self.reader.list_projects().await?;
        let mut lookups = self.list_builds_bounded(&projects).await;

        let summaries = projects
            .into_iter()
            .zip(lookups.iter_mut())
            .map(|(project, lookup)| {
                let latest = match lookup.take() {
                    Some(Ok(builds)) => match select_latest(&project.id, builds) {
                        Some(build) => LatestBuild::Found(build),
                        None => LatestBuild::NoBuild,
                    },
                    Some(Err(e)) => {
                        counter!(BUILD_LOOKUP_FAILURES).increment(1);
                        tracing::warn!(
                            project_id = %project.id,
                            error = %e,
                            "Build lookup failed, summary degraded"
                        );
                        LatestBuild::LookupFailed(public_reason(&e).to_string())
                    }
                    None => LatestBuild::LookupFailed("build lookup did not complete".into()),
                };
                ProjectBuildSummary { project, latest }
            })
            .collect();

        Ok(summaries)
    }

    /// Lists the builds of every project, at most `max_concurrency` at a time.
    /// The result is indexed like `projects`.
    async fn list_builds_bounded(
        &self,
        projects: &[Project],
    ) -> Vec<Option<Result<Vec<Build>, StorageError>>> {
        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();
        // Maps task ids back to project positions so a panicked task can be
        // attributed to its project.
        let mut task_index = HashMap::with_capacity(projects.len());

        for (index, project) in projects.iter().enumerate() {
            let reader = self.reader.clone();
            let limiter = limiter.clone();
            let project_id = project.id.clone();

            let handle = join_set.spawn(async move {
                let _permit = limiter.acquire().await;
                let builds = reader.list_builds(&project_id).await;
                (index, builds)
            });
            task_index.insert(handle.id(), index);
        }

        let mut lookups: Vec<Option<Result<Vec<Build>, StorageError>>> =
            (0..projects.len()).map(|_| None).collect();

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((_, (index, builds))) => {
                    lookups[index] = Some(builds);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Build lookup task failed");
                    if let Some(&index) = task_index.get(&e.id()) {
                        lookups[index] = Some(Err(StorageError::Unavailable(format!(
                            "build lookup task failed: {e}"
                        ))));
                    }
                }
            }
        }

        lookups
    }
}
