use crate::services::audit::{AuditService, PushMetrics};
use crate::services::dispatch::Dispatcher;
use crate::services::health_service::HealthService;
use crate::services::registration_service::RegistrationService;
use axum::body::Body;
use axum::http::Request;
use axum::{Router, routing::get, routing::post};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod health;
pub mod metrics;
pub mod middleware;
pub mod notifications;
pub mod registrations;
pub mod schemas;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub instance_token: Arc<str>,
    pub registration_service: RegistrationService,
    pub dispatcher: Dispatcher,
    pub audit: AuditService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
    pub metrics: PushMetrics,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub registration_service: RegistrationService,
    pub dispatcher: Dispatcher,
    pub audit: AuditService,
}

/// Configures and returns the public API router.
pub fn app_router(instance_token: &str, services: ServiceContainer) -> Router {
    let state = AppState {
        instance_token: Arc::from(instance_token),
        registration_service: services.registration_service,
        dispatcher: services.dispatcher,
        audit: services.audit,
    };

    Router::new()
        .route("/register", post(registrations::register))
        .route("/deregister", post(registrations::deregister))
        .route("/send", post(notifications::send))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(axum::http::HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
}
