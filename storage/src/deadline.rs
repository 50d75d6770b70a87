//! Per-call deadline around any reader. A call that overruns fails with
//! `StorageError::Timeout`; it is never reported as a missing record.

use crate::metrics_defs::STORE_TIMEOUTS;
use crate::reader::{ResourceReader, StorageError};
use crate::types::{Build, Job, LogStream, Project};
use async_trait::async_trait;
use shared::counter;
use std::future::Future;
use std::time::Duration;

pub struct DeadlineReader<R> {
    inner: R,
    limit: Duration,
}

impl<R: ResourceReader> DeadlineReader<R> {
    pub fn new(inner: R, limit: Duration) -> Self {
        DeadlineReader { inner, limit }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.limit, fut).await.map_err(|_| {
            counter!(STORE_TIMEOUTS).increment(1);
            StorageError::Timeout(self.limit)
        })?
    }
}

#[async_trait]
impl<R: ResourceReader> ResourceReader for DeadlineReader<R> {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        self.bounded(self.inner.list_projects()).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        self.bounded(self.inner.get_project(id)).await
    }

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, StorageError> {
        self.bounded(self.inner.list_builds(project_id)).await
    }

    async fn get_build(&self, id: &str) -> Result<Option<Build>, StorageError> {
        self.bounded(self.inner.get_build(id)).await
    }

    async fn list_jobs(&self, build_id: &str) -> Result<Vec<Job>, StorageError> {
        self.bounded(self.inner.list_jobs(build_id)).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        self.bounded(self.inner.get_job(id)).await
    }

    /// The deadline covers opening the stream, not reading it.
    async fn stream_logs(&self, job_id: &str) -> Result<Option<LogStream>, StorageError> {
        self.bounded(self.inner.stream_logs(job_id)).await
    }
}
