//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "momentos_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "momentos_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "momentos_http_requests_in_flight";

    pub const UPLOAD_DURATION_SECONDS: &str = "momentos_upload_duration_seconds";
    pub const UPLOAD_TIMEOUTS_TOTAL: &str = "momentos_upload_timeouts_total";

    pub const RATE_LIMIT_HITS_TOTAL: &str = "momentos_rate_limit_hits_total";
}

/// Path segments that follow these collections are ids.
static ID_SEGMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(weddings|albums|photos|tokens)/[^/]+").expect("valid id pattern")
});

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the wall time of one upload request.
pub fn record_upload_duration(outcome: &'static str, duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_upload_timeout() {
    counter!(names::UPLOAD_TIMEOUTS_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Replace ids in a path so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    ID_SEGMENTS.replace_all(path, "/$1/:id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/weddings/ana-leo/albums/moments/photos/abc123/approve"),
            "/api/weddings/:id/albums/:id/photos/:id/approve"
        );
        assert_eq!(
            sanitize_path("/api/weddings/ana-leo/albums/moments/uploads"),
            "/api/weddings/:id/albums/:id/uploads"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
