/// Prometheus metrics for the GradAid service
///
/// Covers:
/// - HTTP request counts and latencies
/// - Application and document lifecycle events
/// - AI credit consumption and document generation
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, Encoder, Gauge,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========== Application Metrics ==========

    /// Applications created by priority
    pub static ref APPLICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "applications_created_total",
        "Total number of applications created",
        &["priority"]
    )
    .unwrap();

    /// Application status changes, user-driven or derived
    pub static ref APPLICATION_STATUS_CHANGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "application_status_changes_total",
        "Total number of application status changes",
        &["status", "source"]
    )
    .unwrap();

    /// Document status transitions by document type and new status
    pub static ref DOCUMENT_STATUS_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "document_status_transitions_total",
        "Total number of document status transitions",
        &["document_type", "status"]
    )
    .unwrap();

    // ========== Credit Metrics ==========

    /// Credits consumed by usage type
    pub static ref CREDITS_CONSUMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ai_credits_consumed_total",
        "Total number of AI credits consumed",
        &["usage_type"]
    )
    .unwrap();

    // ========== Generation Metrics ==========

    /// Document generation attempts by document type and outcome
    pub static ref GENERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "document_generations_total",
        "Total number of document generation attempts",
        &["document_type", "status"]
    )
    .unwrap();

    /// Generation call duration in seconds
    pub static ref GENERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "document_generation_duration_seconds",
        "Language model call latencies in seconds",
        &["document_type"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();

    static ref STARTED_AT: Instant = Instant::now();
}

/// Pin the uptime origin to process start
pub fn mark_started() {
    lazy_static::initialize(&STARTED_AT);
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    UPTIME_SECONDS.set(STARTED_AT.elapsed().as_secs_f64());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

pub fn record_application_created(priority: &str) {
    APPLICATIONS_CREATED_TOTAL.with_label_values(&[priority]).inc();
}

/// `source` is "user" or "derived"
pub fn record_application_status_change(status: &str, source: &str) {
    APPLICATION_STATUS_CHANGES_TOTAL
        .with_label_values(&[status, source])
        .inc();
}

pub fn record_document_status(document_type: &str, status: &str) {
    DOCUMENT_STATUS_TRANSITIONS_TOTAL
        .with_label_values(&[document_type, status])
        .inc();
}

/// Record a generation attempt
pub fn record_generation(document_type: &str, success: bool, duration: f64) {
    GENERATIONS_TOTAL
        .with_label_values(&[document_type, if success { "success" } else { "failure" }])
        .inc();
    GENERATION_DURATION_SECONDS
        .with_label_values(&[document_type])
        .observe(duration);
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/applications", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_lifecycle_events() {
        record_application_created("high");
        record_application_status_change("in_progress", "derived");
        record_document_status("sop", "draft");
        let metrics = render_metrics();
        assert!(metrics.contains("applications_created_total"));
        assert!(metrics.contains("application_status_changes_total"));
        assert!(metrics.contains("document_status_transitions_total"));
    }

    #[test]
    fn test_record_generation() {
        record_generation("lor", false, 1.2);
        CREDITS_CONSUMED_TOTAL.with_label_values(&["lor_request"]).inc_by(3);
        let metrics = render_metrics();
        assert!(metrics.contains("document_generations_total"));
        assert!(metrics.contains("ai_credits_consumed_total"));
    }
}
