//! Read access to the Project, Build and Job records owned by the
//! orchestration store.

pub mod config;
pub mod deadline;
pub mod filesystem;
#[cfg(any(test, feature = "testutils"))]
pub mod memory;
pub mod metrics_defs;
pub mod reader;
pub mod types;

use config::{StoreConfig, StoreType};
use deadline::DeadlineReader;
use filesystem::FilesystemReader;
use reader::ResourceReader;
use std::sync::Arc;
use std::time::Duration;

/// Builds the reader selected by the store configuration, bounded by the
/// configured per-call deadline if there is one.
pub fn get_reader(config: &StoreConfig, namespace: &str) -> Arc<dyn ResourceReader> {
    let timeout = config.timeout_ms.map(Duration::from_millis);

    match &config.r#type {
        StoreType::Filesystem { base_dir } => {
            tracing::info!(base_dir = %base_dir, namespace = %namespace, "Using filesystem store");
            with_deadline(FilesystemReader::new(base_dir, namespace), timeout)
        }
    }
}

fn with_deadline<R: ResourceReader + 'static>(
    reader: R,
    timeout: Option<Duration>,
) -> Arc<dyn ResourceReader> {
    match timeout {
        Some(limit) => Arc::new(DeadlineReader::new(reader, limit)),
        None => Arc::new(reader),
    }
}
