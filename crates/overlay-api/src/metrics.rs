//! Prometheus metrics for the render-job service.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the process-wide Prometheus recorder and returns a handle for `/metrics`.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "overlay_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "overlay_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "overlay_http_requests_in_flight";

    pub const QUEUE_LENGTH: &str = "overlay_queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "overlay_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "overlay_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "overlay_jobs_failed_total";

    pub const RENDER_DURATION_SECONDS: &str = "overlay_render_duration_seconds";
    pub const VARIANTS_RENDERED_TOTAL: &str = "overlay_variants_rendered_total";
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

pub fn record_render_duration(variant: &str, duration_secs: f64) {
    let labels = [("variant", variant.to_string())];
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
    counter!(names::VARIANTS_RENDERED_TOTAL, &labels).increment(1);
}

/// Records request count, duration, and in-flight gauge for every HTTP request.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16().to_string();
    let labels = [("method", method), ("path", path), ("status", status)];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(start.elapsed().as_secs_f64());

    response
}
