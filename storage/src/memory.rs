//! In-process reader over materialized records, with fault injection.
//! Only compiled for tests and the `testutils` feature.

use crate::reader::{ResourceReader, StorageError};
use crate::types::{Build, Job, LogStream, Project};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Produces a fresh log stream each time a job's logs are opened.
pub type LogSource = Box<dyn Fn() -> LogStream + Send + Sync>;

#[derive(Default)]
pub struct MemoryReader {
    projects: Vec<Project>,
    builds: Vec<Build>,
    jobs: Vec<Job>,
    logs: HashMap<String, Vec<Bytes>>,
    log_sources: HashMap<String, LogSource>,
    unavailable: AtomicBool,
    failing_build_listings: HashSet<String>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    pub fn with_build(mut self, build: Build) -> Self {
        self.builds.push(build);
        self
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Log output of a job, delivered as one stream item per chunk.
    pub fn with_logs<I, C>(mut self, job_id: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        self.logs
            .insert(job_id.to_string(), chunks.into_iter().map(Into::into).collect());
        self
    }

    /// Serves a job's logs from `source` instead of fixed chunks.
    pub fn with_log_source<F>(mut self, job_id: &str, source: F) -> Self
    where
        F: Fn() -> LogStream + Send + Sync + 'static,
    {
        self.log_sources.insert(job_id.to_string(), Box::new(source));
        self
    }

    /// Makes `list_builds` fail for one project while every other call succeeds.
    pub fn fail_build_listing(mut self, project_id: &str) -> Self {
        self.failing_build_listings.insert(project_id.to_string());
        self
    }

    /// Every call waits this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of reader calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn check(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StorageError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceReader for MemoryReader {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        self.check().await?;
        Ok(self.projects.clone())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        self.check().await?;
        Ok(self.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, StorageError> {
        self.check().await?;
        if self.failing_build_listings.contains(project_id) {
            return Err(StorageError::Unavailable(format!(
                "build listing for {project_id} failed"
            )));
        }
        Ok(self
            .builds
            .iter()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_build(&self, id: &str) -> Result<Option<Build>, StorageError> {
        self.check().await?;
        Ok(self.builds.iter().find(|b| b.id == id).cloned())
    }

    async fn list_jobs(&self, build_id: &str) -> Result<Vec<Job>, StorageError> {
        self.check().await?;
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.build_id == build_id)
            .cloned()
            .collect())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        self.check().await?;
        Ok(self.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn stream_logs(&self, job_id: &str) -> Result<Option<LogStream>, StorageError> {
        self.check().await?;
        if !self.jobs.iter().any(|j| j.id == job_id) {
            return Ok(None);
        }
        if let Some(source) = self.log_sources.get(job_id) {
            return Ok(Some(source()));
        }
        let chunks = self.logs.get(job_id).cloned().unwrap_or_default();
        Ok(Some(stream::iter(chunks.into_iter().map(Ok)).boxed()))
    }
}
