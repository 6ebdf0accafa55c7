//! Event notification handlers

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use notifier_core::{
    types::{IncomingEvent, NotificationMessage},
    utils::format_request,
    Error,
};
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::mail::{DeliveryReceipt, MailError};
use crate::server::AppState;

/// Request id header, set on every request and echoed on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Response Helpers
// ============================================================================

fn error_response(err: Error) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, err.to_string()).into_response()
}

fn ok_response() -> Response {
    (StatusCode::OK, "OK").into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST / - Notify recipients about a newly created object
pub async fn handle_event(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let span = info_span!("event", request_id = %request_id);

    async move {
        info!(
            "{}",
            format_request(method.as_str(), &uri.to_string(), &headers, &body)
        );

        let event = match IncomingEvent::decode(&headers, &body) {
            Ok(event) => event,
            Err(e) => {
                let err = Error::from(e);
                warn!(code = err.code(), "Rejecting event: {}", err);
                state.metrics.record_event_rejected();
                return error_response(err);
            }
        };
        state.metrics.record_event_received(&event.shape());

        if !state.filter.admits(&event.bucket) {
            info!(
                "Input bucket '{}' does not match with expected bucket '{}'",
                event.bucket,
                state.filter.expected().unwrap_or_default()
            );
            state.metrics.record_event_filtered();
            return ok_response();
        }

        // Delivery is best effort: failures are logged and never change the response.
        if let Err(e) = notify(&state, &event).await {
            let err = Error::from(e);
            error!(code = err.code(), "{}", err);
        }

        ok_response()
    }
    .instrument(span)
    .await
}

/// Build the notification for `event` and hand it to the mail transport.
pub async fn notify(
    state: &AppState,
    event: &IncomingEvent,
) -> Result<DeliveryReceipt, MailError> {
    info!(
        "notify with bucket '{}' and name '{}'",
        event.bucket, event.object_name
    );

    let message = NotificationMessage::for_object(
        &event.bucket,
        &event.object_name,
        &state.config.notification.to_emails,
    );
    info!("Sending email to '{}'", message.to.join(", "));
    info!("Email content {:?}", message);

    let start = Instant::now();
    let result = state.mailer.send(&message).await;
    state
        .metrics
        .record_notification(result.is_ok(), start.elapsed().as_secs_f64());

    if let Ok(receipt) = &result {
        info!("Email status code {}", receipt.status_code);
    }
    result
}

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": notifier_core::VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MailTransport;
    use crate::metrics::MetricsRecorder;
    use crate::server::{create_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use notifier_core::NotifierConfig;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use tracing::instrument::WithSubscriber;

    /// Records every message; fails each send when `fail` is set.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<NotificationMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, message: &NotificationMessage) -> Result<DeliveryReceipt, MailError> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Err(MailError::Rejected {
                    status: 401,
                    body: "invalid api key".to_string(),
                })
            } else {
                Ok(DeliveryReceipt { status_code: 202 })
            }
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn error_count(&self) -> usize {
            let logs = self.0.lock().unwrap();
            String::from_utf8_lossy(&logs)
                .lines()
                .filter(|line| line.contains("ERROR"))
                .count()
        }
    }

    fn config(bucket: Option<&str>, to: &str) -> NotifierConfig {
        let mut config = NotifierConfig::default();
        config.notification.expected_bucket = bucket.map(str::to_string);
        config.notification.to_emails = vec![to.to_string()];
        config
    }

    fn app(config: NotifierConfig, transport: Arc<RecordingTransport>) -> axum::Router {
        create_router(AppState::new(config, transport))
    }

    fn direct_event(bucket: &str, name: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"bucket": "{}", "name": "{}"}}"#,
                bucket, name
            )))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_audit_log_event_dispatches() {
        let transport = Arc::new(RecordingTransport::default());
        let app = app(config(Some("charts"), "a@b.com"), transport.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("ce-type", "com.google.cloud.auditlog.event")
            .body(Body::from(
                r#"{"protoPayload":{"resourceName":"projects/_/buckets/charts/objects/q1.png"}}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_string(response).await, "OK");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["a@b.com"]);
        assert!(sent[0]
            .html_body
            .contains("https://storage.cloud.google.com/charts/q1.png"));
    }

    #[tokio::test]
    async fn test_direct_event_without_filter_dispatches() {
        let transport = Arc::new(RecordingTransport::default());
        let app = app(config(None, "a@b.com"), transport.clone());

        let response = app.oneshot(direct_event("any", "x.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_matching_bucket_dispatches() {
        let transport = Arc::new(RecordingTransport::default());
        let app = app(config(Some("expected"), "a@b.com"), transport.clone());

        let response = app.oneshot(direct_event("expected", "x.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bucket_mismatch_skips_mail() {
        let transport = Arc::new(RecordingTransport::default());
        let app = app(config(Some("expected"), "a@b.com"), transport.clone());

        let response = app.oneshot(direct_event("other", "x.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_still_ok_and_logs_once() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let app = app(config(None, "a@b.com"), transport.clone());

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        let response = app
            .oneshot(direct_event("charts", "q1.png"))
            .with_subscriber(subscriber)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert_eq!(logs.error_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let transport = Arc::new(RecordingTransport::default());

        for body in [
            "not json",
            r#"{"bucket": "b"}"#,
            r#"{"bucket": "", "name": "n"}"#,
            r#"["charts", "q1.png"]"#,
        ] {
            let request = Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from(body))
                .unwrap();
            let response = app(config(None, "a@b.com"), transport.clone())
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("ce-type", "com.google.cloud.auditlog.event")
            .body(Body::from(
                r#"{"protoPayload":{"resourceName":"projects/_/buckets/charts"}}"#,
            ))
            .unwrap();
        let response = app(config(None, "a@b.com"), transport.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert!(body_string(response).await.starts_with("Malformed payload"));

        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let transport = Arc::new(RecordingTransport::default());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app(config(None, "a@b.com"), transport)
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_request_id_on_every_response() {
        let transport = Arc::new(RecordingTransport::default());

        let request = Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        let response = app(config(None, "a@b.com"), transport.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(id.len(), 32);

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = app(config(None, "a@b.com"), transport.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(REQUEST_ID_HEADER, "caller-supplied-id")
            .body(Body::from(r#"{"bucket": "b", "name": "n"}"#))
            .unwrap();
        let response = app(config(None, "a@b.com"), transport)
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "caller-supplied-id");
    }

    #[test]
    fn test_event_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let metrics = Arc::new(MetricsRecorder::from_handle(recorder.handle()));

        let delivering = create_router(AppState::with_metrics(
            config(Some("charts"), "a@b.com"),
            Arc::new(RecordingTransport::default()),
            metrics.clone(),
        ));
        let failing = create_router(AppState::with_metrics(
            config(Some("charts"), "a@b.com"),
            Arc::new(RecordingTransport {
                fail: true,
                ..Default::default()
            }),
            metrics.clone(),
        ));

        // Macros record into the thread-local recorder, so drive everything on this thread.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let rendered = ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let audit = Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("ce-type", "com.google.cloud.auditlog.event")
                    .body(Body::from(
                        r#"{"protoPayload":{"resourceName":"projects/_/buckets/charts/objects/q1.png"}}"#,
                    ))
                    .unwrap();
                let rejected = Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("not json"))
                    .unwrap();

                for (router, request) in [
                    (&delivering, audit),
                    (&delivering, direct_event("other", "x.png")),
                    (&delivering, rejected),
                    (&failing, direct_event("charts", "q2.png")),
                ] {
                    router.clone().oneshot(request).await.unwrap();
                }

                let request = Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap();
                let response = delivering.clone().oneshot(request).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                body_string(response).await
            })
        });

        assert!(rendered.contains(r#"notifier_events_received_total{shape="audit_log"} 1"#));
        assert!(rendered.contains(r#"notifier_events_received_total{shape="direct"} 2"#));
        assert!(rendered.contains("notifier_events_rejected_total 1"));
        assert!(rendered.contains("notifier_events_filtered_total 1"));
        assert!(rendered.contains("notifier_notifications_sent_total 1"));
        assert!(rendered.contains("notifier_notifications_failed_total 1"));
        assert!(rendered.contains("notifier_mail_send_duration_seconds_count 2"));
        assert!(rendered.contains("notifier_uptime_seconds"));
    }
}
