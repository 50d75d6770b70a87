//! Request filters wrapped around every route, fallback included.
//!
//! Declared order, outermost first:
//! 1. `cors` answers `OPTIONS` itself and decorates every other response.
//! 2. `access_log` records one line per completed request.

pub mod access_log;
pub mod cors;

use access_log::AccessLogSink;
use axum::Router;
use axum::middleware::from_fn_with_state;
use cors::CorsPolicy;
use std::sync::Arc;

pub struct Filters {
    pub cors: Arc<CorsPolicy>,
    pub access_log: Arc<dyn AccessLogSink>,
}

pub fn apply(router: Router, filters: Filters) -> Router {
    // Each layer wraps everything added before it, so the innermost filter
    // goes on first.
    router
        .layer(from_fn_with_state(filters.access_log, access_log::access_log))
        .layer(from_fn_with_state(filters.cors, cors::cors))
}
