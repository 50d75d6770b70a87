//! Reads resource records from a namespace directory.
//!
//! Layout below `<base_dir>/<namespace>/`:
//! `projects/<id>.yaml`, `builds/<id>.yaml`, `jobs/<id>.yaml` and
//! `logs/<job_id>.log`. Nothing is cached; every call reads the records again.

use crate::metrics_defs::STORE_DECODE_ERRORS;
use crate::reader::{ResourceReader, StorageError};
use crate::types::{Build, Job, LogStream, Project, is_valid_resource_id};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::{StreamExt, stream};
use serde::de::DeserializeOwned;
use shared::counter;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const RECORD_EXTENSION: &str = "yaml";
const LOG_EXTENSION: &str = "log";
const LOG_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Clone, Copy, Debug)]
enum Collection {
    Projects,
    Builds,
    Jobs,
    Logs,
}

impl Collection {
    fn dir_name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Builds => "builds",
            Collection::Jobs => "jobs",
            Collection::Logs => "logs",
        }
    }
}

pub struct FilesystemReader {
    root: PathBuf,
}

impl FilesystemReader {
    pub fn new(base_dir: impl AsRef<Path>, namespace: &str) -> Self {
        FilesystemReader {
            root: base_dir.as_ref().join(namespace),
        }
    }

    fn record_path(&self, collection: Collection, id: &str, extension: &str) -> PathBuf {
        self.root
            .join(collection.dir_name())
            .join(format!("{id}.{extension}"))
    }

    /// The namespace directory stands in for the store itself: if it is gone
    /// the store is unreachable, not empty.
    async fn ensure_namespace(&self) -> Result<(), StorageError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::Unavailable(format!(
                "namespace directory {} does not exist",
                self.root.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_record<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        if !is_valid_resource_id(id) {
            return Ok(None);
        }
        self.ensure_namespace().await?;

        let path = self.record_path(collection, id, RECORD_EXTENSION);
        match tokio::fs::read(&path).await {
            Ok(data) => decode(&path, &data).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_collection<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, StorageError> {
        self.ensure_namespace().await?;

        let dir = self.root.join(collection.dir_name());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match tokio::fs::read(&path).await {
                Ok(data) => records.push(decode(&path, &data)?),
                // Removed between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(records)
    }

    async fn jobs_of_build(&self, build_id: &str) -> Result<Vec<Job>, StorageError> {
        let Some(build) = self.read_record::<Build>(Collection::Builds, build_id).await? else {
            return Ok(Vec::new());
        };

        let mut jobs = Vec::with_capacity(build.job_ids.len());
        for job_id in &build.job_ids {
            match self.read_record::<Job>(Collection::Jobs, job_id).await? {
                Some(job) if job.build_id == build.id => jobs.push(job),
                Some(job) => tracing::warn!(
                    build_id = %build.id,
                    job_id = %job.id,
                    owner = %job.build_id,
                    "Job listed by build belongs to another build"
                ),
                None => tracing::warn!(
                    build_id = %build.id,
                    job_id = %job_id,
                    "Job listed by build has no record"
                ),
            }
        }

        Ok(jobs)
    }

    async fn open_logs(&self, job_id: &str) -> Result<Option<LogStream>, StorageError> {
        if self.read_record::<Job>(Collection::Jobs, job_id).await?.is_none() {
            return Ok(None);
        }

        let path = self.record_path(Collection::Logs, job_id, LOG_EXTENSION);
        match File::open(&path).await {
            Ok(file) => Ok(Some(file_stream(file))),
            // The job has not written any output yet
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Some(stream::empty().boxed())),
            Err(e) => Err(e.into()),
        }
    }
}

fn decode<T: DeserializeOwned>(path: &Path, data: &[u8]) -> Result<T, StorageError> {
    serde_yaml::from_slice(data).map_err(|source| {
        counter!(STORE_DECODE_ERRORS).increment(1);
        StorageError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn file_stream(file: File) -> LogStream {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(LOG_CHUNK_SIZE);
        match file.read_buf(&mut buf).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some((buf.freeze(), file))),
            Err(e) => Err(StorageError::from(e)),
        }
    })
    .boxed()
}

#[async_trait]
impl ResourceReader for FilesystemReader {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        self.read_collection(Collection::Projects).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        self.read_record(Collection::Projects, id).await
    }

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, StorageError> {
        let builds: Vec<Build> = self.read_collection(Collection::Builds).await?;

        Ok(builds
            .into_iter()
            .filter(|build| build.project_id == project_id)
            .collect())
    }

    async fn get_build(&self, id: &str) -> Result<Option<Build>, StorageError> {
        self.read_record(Collection::Builds, id).await
    }

    async fn list_jobs(&self, build_id: &str) -> Result<Vec<Job>, StorageError> {
        self.jobs_of_build(build_id).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StorageError> {
        self.read_record(Collection::Jobs, id).await
    }

    async fn stream_logs(&self, job_id: &str) -> Result<Option<LogStream>, StorageError> {
        self.open_logs(job_id).await
    }
}
