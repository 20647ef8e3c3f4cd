use crate::api::AppState;
use crate::api::registrations::reject_body;
use crate::api::schemas::MessageResponse;
use crate::api::schemas::notifications::SendRequest;
use crate::domain::audit::AuditRecord;
use crate::error::Result;
use crate::services::validation;
use axum::{Json, extract::State, extract::rejection::JsonRejection};

/// Pushes a call notification to the device registered under the topic.
///
/// # Errors
/// Returns `AppError::TopicNotFound` for unknown topics, `AppError::StaleDevice` when the
/// provider dropped the device and `AppError::Provider` for other provider failures.
pub async fn send(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = payload.map_err(|rejection| reject_body(&state, "/send", &rejection))?;

    if let Err(e) = validation::validate_topic(&req.topic) {
        state.audit.record(AuditRecord::invalid("/send", e.to_string()));
        return Err(e.into());
    }

    let message_id = state.dispatcher.send(req.into()).await?;
    Ok(Json(MessageResponse::new(message_id)))
}
