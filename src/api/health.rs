use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use crate::config::StorageBackend;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: answers as long as the server is running.
pub async fn livez() -> &'static str {
    "OK"
}

/// Readiness probe: checks connectivity to the registry store.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (status_code, registry_status) = match state.health_service.check_registry().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, component = "registry", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let backend = match state.health_service.backend() {
        StorageBackend::Valkey => "valkey",
        StorageBackend::Memory => "memory",
    };

    let response = HealthResponse {
        status: registry_status.to_string(),
        registry: registry_status.to_string(),
        backend: backend.to_string(),
    };

    (status_code, Json(response))
}
