use crate::config::MetricsConfig;
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_all;

const METRICS_PREFIX: &str = "brigade";

/// Installs the statsd recorder and registers every known metric with it.
/// Without a recorder all metric calls are no-ops.
pub fn init(config: &MetricsConfig) -> Result<(), String> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| e.to_string())?;
    metrics::set_global_recorder(recorder).map_err(|e| e.to_string())?;

    describe_all(api::metrics_defs::ALL_METRICS);
    describe_all(storage::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Metrics exported over statsd"
    );
    Ok(())
}
