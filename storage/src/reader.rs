use crate::types::{Build, Job, LogStream, Project};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode record {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("store did not respond within {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the Project, Build and Job records of the backing store.
///
/// Lookups by identifier return `Ok(None)` when the record does not exist.
/// An `Err` always means the store itself could not answer.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError>;

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, StorageError>;

    async fn get_build(&self, id: &str) -> Result<Option<Build>, StorageError>;

    /// Jobs spawned by a build. Unknown builds yield an empty list.
    async fn list_jobs(&self, build_id: &str) -> Result<Vec<Job>, StorageError>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError>;

    /// Opens the log stream of a job. A job that exists but has not written
    /// any output yet yields an empty stream.
    async fn stream_logs(&self, job_id: &str) -> Result<Option<LogStream>, StorageError>;
}
