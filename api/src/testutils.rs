use crate::build_router;
use crate::config::ApiConfig;
use crate::filters::access_log::{AccessLogEntry, AccessLogSink};
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use storage::memory::MemoryReader;
use storage::types::{Build, Job, LogStream, Project, Repository, Status};
use tower::ServiceExt;

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn project(id: &str) -> Project {
    Project {
        id: id.into(),
        name: format!("org/{id}"),
        repo: Repository {
            name: format!("github.com/org/{id}"),
            clone_url: format!("https://github.com/org/{id}.git"),
            ssh_key_ref: None,
        },
        default_script: None,
        secrets_ref: Some(format!("{id}-secrets")),
        namespace: None,
    }
}

pub fn build(id: &str, project_id: &str, created: i64) -> Build {
    Build {
        id: id.into(),
        project_id: project_id.into(),
        event_type: "push".into(),
        provider: "github".into(),
        revision: None,
        created: at(created),
        status: Status::Succeeded,
        job_ids: Vec::new(),
        worker: None,
    }
}

pub fn job(id: &str, build_id: &str, created: i64) -> Job {
    Job {
        id: id.into(),
        name: format!("{id}-step"),
        build_id: build_id.into(),
        image: "alpine:3".into(),
        created: at(created),
        started: None,
        ended: None,
        exit_code: None,
        status: Status::Running,
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A log that never ends. `dropped` is set once the stream is released.
pub fn endless_logs(line: &'static str, dropped: Arc<AtomicBool>) -> LogStream {
    stream::unfold(DropFlag(dropped), move |flag| async move {
        Some((Ok(Bytes::from_static(line.as_bytes())), flag))
    })
    .boxed()
}

/// Keeps every recorded entry for inspection.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AccessLogSink for RecordingSink {
    fn record(&self, entry: &AccessLogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

pub fn test_config() -> ApiConfig {
    serde_yaml::from_str(
        r#"
cors:
    allowed_origins: ["https://ui.example.com"]
store:
    type: filesystem
    base_dir: /nonexistent
"#,
    )
    .unwrap()
}

pub fn test_router(reader: Arc<MemoryReader>) -> (Router, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let router = build_router(reader, &test_config(), sink.clone());
    (router, sink)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

/// Sends one request through the router and reads the whole body.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Sends a GET and returns the response with its body still unread.
pub async fn open(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Reads the next data frame of a body.
pub async fn next_chunk(body: &mut Body) -> Bytes {
    body.frame().await.unwrap().unwrap().into_data().unwrap()
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}
