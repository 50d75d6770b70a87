//! Access logging in NCSA common log format.
//!
//! The entry is written once the response body has been fully sent (or
//! dropped because the client went away), so status and byte count are final.

use crate::metrics_defs::{HTTP_REQUESTS, HTTP_REQUEST_DURATION};
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use shared::http::basic_auth_username;
use shared::{counter, histogram};
use std::fmt;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";
const PLACEHOLDER: &str = "-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub remote_host: String,
    pub username: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub request_uri: String,
    pub protocol: String,
    pub status: u16,
    pub bytes: u64,
}

impl fmt::Display for AccessLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} [{}] \"{} {} {}\" {} {}",
            self.remote_host,
            self.username,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.method,
            self.request_uri,
            self.protocol,
            self.status,
            self.bytes,
        )
    }
}

/// Destination for access log entries. Owned by a server instance and
/// handed to the filter, so several servers can log independently.
///
/// Called once the response body has finished. A panicking sink loses the
/// entry but never the response.
pub trait AccessLogSink: Send + Sync {
    fn record(&self, entry: &AccessLogEntry);
}

/// Emits every entry as one `tracing` event with target `access_log`.
pub struct TracingAccessLog;

impl AccessLogSink for TracingAccessLog {
    fn record(&self, entry: &AccessLogEntry) {
        tracing::info!(
            target: "access_log",
            method = %entry.method,
            uri = %entry.request_uri,
            status = entry.status,
            bytes = entry.bytes,
            "{entry}"
        );
    }
}

/// Request details captured before the inner chain runs.
struct PendingEntry {
    remote_host: String,
    username: String,
    method: String,
    request_uri: String,
    protocol: String,
    started: Instant,
}

impl PendingEntry {
    fn from_request(request: &Request) -> Self {
        let remote_host = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        let username =
            basic_auth_username(request.headers()).unwrap_or_else(|| PLACEHOLDER.to_string());

        let request_uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        PendingEntry {
            remote_host,
            username,
            method: request.method().to_string(),
            request_uri,
            protocol: format!("{:?}", request.version()),
            started: Instant::now(),
        }
    }

    fn complete(self, status: StatusCode, bytes: u64) -> AccessLogEntry {
        counter!(HTTP_REQUESTS, "method" => self.method.clone(), "status" => status.as_str().to_string())
            .increment(1);
        histogram!(HTTP_REQUEST_DURATION).record(self.started.elapsed().as_secs_f64());

        AccessLogEntry {
            remote_host: self.remote_host,
            username: self.username,
            timestamp: Local::now().fixed_offset(),
            method: self.method,
            request_uri: self.request_uri,
            protocol: self.protocol,
            status: status.as_u16(),
            bytes,
        }
    }
}

pub async fn access_log(
    State(sink): State<Arc<dyn AccessLogSink>>,
    request: Request,
    next: Next,
) -> Response {
    let pending = PendingEntry::from_request(&request);

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body = CountingBody {
        inner: body,
        bytes: 0,
        status: parts.status,
        pending: Some(pending),
        sink,
    };
    Response::from_parts(parts, Body::new(body))
}

/// Counts the bytes sent and records the entry exactly once, at end of
/// stream, on a body error, or when dropped early.
struct CountingBody {
    inner: Body,
    bytes: u64,
    status: StatusCode,
    pending: Option<PendingEntry>,
    sink: Arc<dyn AccessLogSink>,
}

impl CountingBody {
    fn finish(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            let entry = pending.complete(self.status, self.bytes);
            self.sink.record(&entry);
        }));
        if recorded.is_err() {
            tracing::warn!(status = self.status.as_u16(), "Access log sink failed, entry dropped");
        }
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}
