use shared::metrics_defs::{MetricDef, MetricType};

pub const HTTP_REQUESTS: MetricDef = MetricDef {
    name: "http.requests",
    metric_type: MetricType::Counter,
    description: "Number of completed requests. Tagged with method, status.",
};

pub const HTTP_REQUEST_DURATION: MetricDef = MetricDef {
    name: "http.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time from receiving a request to the end of its response body, in seconds",
};

pub const BACKEND_ERRORS: MetricDef = MetricDef {
    name: "store.unavailable",
    metric_type: MetricType::Counter,
    description: "Number of requests answered as backend unavailable",
};

pub const BUILD_LOOKUP_FAILURES: MetricDef = MetricDef {
    name: "aggregator.build_lookup.failed",
    metric_type: MetricType::Counter,
    description: "Number of per-project build listings that failed during summary aggregation",
};

pub const ALL_METRICS: &[MetricDef] = &[
    HTTP_REQUESTS,
    HTTP_REQUEST_DURATION,
    BACKEND_ERRORS,
    BUILD_LOOKUP_FAILURES,
];
