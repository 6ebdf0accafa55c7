//! Notifier HTTP server

use axum::{
    extract::FromRef,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use notifier_core::{config::NotifierConfig, utils::generate_request_id, BucketFilter, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{info, warn};

use crate::mail::{MailTransport, SendGridClient};
use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::routes::{self, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NotifierConfig>,
    pub filter: BucketFilter,
    pub mailer: Arc<dyn MailTransport>,
    pub metrics: Arc<MetricsRecorder>,
}

impl AppState {
    /// State with a detached metrics recorder.
    pub fn new(config: NotifierConfig, mailer: Arc<dyn MailTransport>) -> Self {
        Self::with_metrics(config, mailer, Arc::new(MetricsRecorder::detached()))
    }

    pub fn with_metrics(
        config: NotifierConfig,
        mailer: Arc<dyn MailTransport>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            filter: config.bucket_filter(),
            config: Arc::new(config),
            mailer,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<MetricsRecorder> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Issues ids for requests arriving without an `x-request-id`
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeNotifierRequestId;

impl MakeRequestId for MakeNotifierRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&generate_request_id())
            .ok()
            .map(RequestId::new)
    }
}

/// Build the router serving events, health and metrics
pub fn create_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route("/health", get(routes::health))
        // Event delivery
        .route("/", post(routes::handle_event))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeNotifierRequestId,
        ))
        .with_state(state)
}

/// Notifier server
pub struct NotifierServer {
    config: NotifierConfig,
}

impl NotifierServer {
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let metrics = Arc::new(MetricsRecorder::install()?);
        info!("Prometheus metrics initialized");

        let mailer = Arc::new(SendGridClient::new(&self.config.sendgrid)?);

        match self.config.bucket_filter().expected() {
            Some(bucket) => info!("Notifying for bucket '{}' only", bucket),
            None => info!("Notifying for all buckets"),
        }
        if self.config.notification.to_emails.is_empty() {
            warn!("TO_EMAILS is not set; notifications will fail");
        }
        if self.config.sendgrid.api_key.is_none() {
            warn!("SENDGRID_API_KEY is not set; notifications will fail");
        }

        let addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let state = AppState::with_metrics(self.config, mailer, metrics);
        let app = create_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("Service started, listening on http://{}", addr);
        info!("Prometheus metrics at http://{}/metrics", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}
