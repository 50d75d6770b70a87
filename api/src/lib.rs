pub mod aggregator;
pub mod config;
pub mod errors;
pub mod filters;
pub mod handlers;
pub mod metrics_defs;
pub mod routes;

#[cfg(test)]
mod testutils;

use aggregator::Aggregator;
use axum::Router;
use axum::http::StatusCode;
use config::ApiConfig;
use filters::Filters;
use filters::access_log::AccessLogSink;
use filters::cors::CorsPolicy;
use std::net::SocketAddr;
use std::sync::Arc;
use storage::reader::ResourceReader;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ApiServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] config::ValidationError),
}

/// Per-server state handed to every handler. Holds no mutable data; each
/// request reads through to the store.
#[derive(Clone)]
pub struct AppState {
    pub(crate) reader: Arc<dyn ResourceReader>,
    pub(crate) aggregator: Aggregator,
}

impl AppState {
    pub fn new(reader: Arc<dyn ResourceReader>, max_concurrency: usize) -> Self {
        AppState {
            aggregator: Aggregator::new(reader.clone(), max_concurrency),
            reader,
        }
    }
}

/// Builds the complete application: every registered route, the fallback,
/// and the filter chain around all of them.
pub fn build_router(
    reader: Arc<dyn ResourceReader>,
    config: &ApiConfig,
    access_log: Arc<dyn AccessLogSink>,
) -> Router {
    let state = AppState::new(reader, config.aggregator.max_concurrency);

    let router = routes::register(Router::new())
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state);

    filters::apply(
        router,
        Filters {
            cors: Arc::new(CorsPolicy::new(config.cors.allowed_origins.clone())),
            access_log,
        },
    )
}

pub async fn serve(
    config: ApiConfig,
    reader: Arc<dyn ResourceReader>,
    access_log: Arc<dyn AccessLogSink>,
) -> Result<(), ApiServerError> {
    config.validate()?;

    let app = build_router(reader, &config, access_log);
    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(addr = %addr, "Get the API using {addr}/apidocs.json");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "Could not listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
