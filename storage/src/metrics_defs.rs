//! Metrics definitions for the storage readers.

use shared::metrics_defs::{MetricDef, MetricType};

pub const STORE_TIMEOUTS: MetricDef = MetricDef {
    name: "store.timeout",
    metric_type: MetricType::Counter,
    description: "Number of store calls that exceeded the configured deadline",
};

pub const STORE_DECODE_ERRORS: MetricDef = MetricDef {
    name: "store.decode_error",
    metric_type: MetricType::Counter,
    description: "Number of records that could not be decoded",
};

pub const ALL_METRICS: &[MetricDef] = &[STORE_TIMEOUTS, STORE_DECODE_ERRORS];
