use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all filestream metrics
const PREFIX: &str = "filestream";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Event Stream Metrics
    pub static ref EVENT_SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        format!("{PREFIX}_event_sessions_active"),
        "Number of connected event stream observers"
    ).expect("Failed to create event_sessions_active metric");

    pub static ref EVENTS_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_events_sent_total"), "Event stream frames sent, by kind"),
        &["kind"]
    ).expect("Failed to create events_sent_total metric");

    pub static ref POLL_ERRORS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_poll_errors_total"),
        "Failed store polls across all sessions"
    ).expect("Failed to create poll_errors_total metric");

    // Store Metrics
    pub static ref UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_uploads_total"), "Upload attempts by outcome"),
        &["status"]
    ).expect("Failed to create uploads_total metric");

    pub static ref UPLOADED_BYTES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_uploaded_bytes_total"),
        "Total bytes stored through uploads"
    ).expect("Failed to create uploaded_bytes_total metric");

    pub static ref STORED_FILES: Gauge = Gauge::new(
        format!("{PREFIX}_stored_files"),
        "Number of files in the store"
    ).expect("Failed to create stored_files metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(EVENT_SESSIONS_ACTIVE.clone()));
    let _ = REGISTRY.register(Box::new(EVENTS_SENT_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(POLL_ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(UPLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(UPLOADED_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STORED_FILES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn set_stored_files(count: usize) {
    STORED_FILES.set(count as f64);
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_session_opened() {
    EVENT_SESSIONS_ACTIVE.inc();
}

pub fn record_session_closed() {
    EVENT_SESSIONS_ACTIVE.dec();
}

pub fn record_event_sent(kind: &str) {
    EVENTS_SENT_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_poll_error() {
    POLL_ERRORS_TOTAL.inc();
}

/// Record a successful upload of `size` bytes
pub fn record_upload(size: usize) {
    UPLOADS_TOTAL.with_label_values(&["stored"]).inc();
    UPLOADED_BYTES_TOTAL.inc_by(size as u64);
    STORED_FILES.inc();
}

/// Record an upload that was rejected or failed (`status` is "rejected" or "failed")
pub fn record_upload_failure(status: &str) {
    UPLOADS_TOTAL.with_label_values(&[status]).inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
