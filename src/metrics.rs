//! Prometheus metrics for the gateway
//!
//! Defines metrics for:
//! - Request counts by method and status
//! - Request latency
//! - Storage operation counts by outcome
//! - Storage operation duration

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

use crate::storage::StorageError;

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

lazy_static! {
    /// Registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// HTTP request counter by method and status
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("gateway_http_requests_total", "Total HTTP requests"),
        &["method", "status"]
    )
    .expect("Failed to create HTTP_REQUESTS metric");

    /// HTTP request latency histogram
    pub static ref HTTP_REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "gateway_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(LATENCY_BUCKETS.to_vec())
    )
    .expect("Failed to create HTTP_REQUEST_DURATION metric");

    /// Storage operation counter by operation and outcome
    pub static ref STORAGE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("gateway_storage_operations_total", "Total storage operations"),
        &["operation", "status"]
    )
    .expect("Failed to create STORAGE_OPERATIONS metric");

    /// Storage operation duration histogram by operation
    pub static ref STORAGE_OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "gateway_storage_operation_duration_seconds",
            "Storage operation duration in seconds"
        )
        .buckets(LATENCY_BUCKETS.to_vec()),
        &["operation"]
    )
    .expect("Failed to create STORAGE_OPERATION_DURATION metric");
}

/// Register all metrics with the gateway registry
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(HTTP_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(STORAGE_OPERATIONS.clone()))?;
    REGISTRY.register(Box::new(STORAGE_OPERATION_DURATION.clone()))?;
    Ok(())
}

/// Record one HTTP request
pub fn observe_http(method: &str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[method, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION.observe(elapsed.as_secs_f64());
}

/// Record one storage operation started at `started`
pub fn observe_storage<T>(operation: &str, started: Instant, result: &Result<T, StorageError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    STORAGE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORAGE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
}

/// Text exposition of everything in the registry
pub fn render() -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
