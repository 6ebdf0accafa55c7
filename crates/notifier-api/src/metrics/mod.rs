//! Prometheus metrics for the notifier
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use notifier_core::types::EventShape;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metric names
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "notifier_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "notifier_http_request_duration_seconds";

    // Event metrics
    pub const EVENTS_RECEIVED_TOTAL: &str = "notifier_events_received_total";
    pub const EVENTS_REJECTED_TOTAL: &str = "notifier_events_rejected_total";
    pub const EVENTS_FILTERED_TOTAL: &str = "notifier_events_filtered_total";

    // Mail metrics
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "notifier_notifications_sent_total";
    pub const NOTIFICATIONS_FAILED_TOTAL: &str = "notifier_notifications_failed_total";
    pub const MAIL_SEND_DURATION_SECONDS: &str = "notifier_mail_send_duration_seconds";

    // System metrics
    pub const UPTIME_SECONDS: &str = "notifier_uptime_seconds";
    pub const INFO: &str = "notifier_info";
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the Prometheus recorder as the process-wide metrics sink
    pub fn install() -> notifier_core::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            notifier_core::Error::InternalError(format!(
                "Failed to install Prometheus recorder: {}",
                e
            ))
        })?;

        gauge!(names::INFO, "version" => notifier_core::VERSION).set(1.0);

        Ok(Self {
            handle,
            start_time: Instant::now(),
        })
    }

    /// Render from `handle` without touching the process-wide recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// A recorder that is not installed globally; its output stays empty.
    pub fn detached() -> Self {
        Self::from_handle(PrometheusBuilder::new().build_recorder().handle())
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, status: u16, duration_secs: f64) {
        let status_class = format!("{}xx", status / 100);

        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "status" => status.to_string(),
            "status_class" => status_class
        )
        .increment(1);

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "method" => method.to_string()
        )
        .record(duration_secs);
    }

    /// Record a successfully decoded event
    pub fn record_event_received(&self, shape: &EventShape) {
        counter!(names::EVENTS_RECEIVED_TOTAL, "shape" => shape.as_str()).increment(1);
    }

    /// Record an event whose payload could not be decoded
    pub fn record_event_rejected(&self) {
        counter!(names::EVENTS_REJECTED_TOTAL).increment(1);
    }

    /// Record an event skipped by the bucket filter
    pub fn record_event_filtered(&self) {
        counter!(names::EVENTS_FILTERED_TOTAL).increment(1);
    }

    /// Record a mail send attempt
    pub fn record_notification(&self, success: bool, duration_secs: f64) {
        if success {
            counter!(names::NOTIFICATIONS_SENT_TOTAL).increment(1);
        } else {
            counter!(names::NOTIFICATIONS_FAILED_TOTAL).increment(1);
        }

        histogram!(names::MAIL_SEND_DURATION_SECONDS).record(duration_secs);
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsRecorder>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics.record_http_request(&method, status, duration);

    debug!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    let output = metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
