use crate::api::AppState;
use crate::api::middleware::InstanceToken;
use crate::api::schemas::MessageResponse;
use crate::api::schemas::registrations::{DeregisterRequest, RegisterRequest};
use crate::domain::audit::AuditRecord;
use crate::error::{AppError, Result};
use axum::{Json, extract::State, extract::rejection::JsonRejection};

/// Binds a topic to a device token.
///
/// # Errors
/// Returns `AppError::AuthError` without a valid Instance-Token header,
/// `AppError::InvalidParameters` for an unparseable body and `AppError::Validation`
/// for malformed fields.
pub async fn register(
    _auth: InstanceToken,
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = payload.map_err(|rejection| reject_body(&state, "/register", &rejection))?;
    state.registration_service.register(&req.topic, &req.token, &req.kind).await?;
    Ok(Json(MessageResponse::new("success")))
}

/// Removes a topic binding when the supplied token matches the stored one.
///
/// # Errors
/// Returns `AppError::InvalidTuple` if the topic is not bound to the supplied token.
pub async fn deregister(
    _auth: InstanceToken,
    State(state): State<AppState>,
    payload: std::result::Result<Json<DeregisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = payload.map_err(|rejection| reject_body(&state, "/deregister", &rejection))?;
    state.registration_service.deregister(&req.topic, &req.token, req.kind.as_deref()).await?;
    Ok(Json(MessageResponse::new("success")))
}

pub(crate) fn reject_body(state: &AppState, endpoint: &str, rejection: &JsonRejection) -> AppError {
    state.audit.record(AuditRecord::invalid(endpoint, rejection.body_text()));
    AppError::InvalidParameters
}
