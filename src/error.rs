use crate::services::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Valkey error: {0}")]
    Valkey(#[from] redis::RedisError),
    #[error("Corrupt registry record for topic {topic}: {reason}")]
    Corrupt { topic: String, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid parameters")]
    InvalidParameters,
    #[error("{0}")]
    AuthError(&'static str),
    #[error("Invalid token/topic tuple")]
    InvalidTuple,
    #[error("no topic found")]
    TopicNotFound,
    #[error("Invalid notification type")]
    InvalidNotificationType,
    #[error("{0}")]
    StaleDevice(String),
    #[error("{0}")]
    Provider(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(e) => {
                tracing::debug!(reason = %e, "Validation failed");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            Self::InvalidParameters => {
                tracing::debug!("Malformed request body");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::AuthError(reason) => {
                tracing::debug!(reason, "Authentication failed");
                (StatusCode::UNAUTHORIZED, reason.to_string())
            }
            Self::InvalidTuple | Self::InvalidNotificationType => {
                tracing::debug!(reason = %self, "Bad request");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::TopicNotFound => {
                tracing::debug!("Topic not found");
                (StatusCode::NOT_FOUND, self.to_string())
            }
            Self::StaleDevice(reason) => {
                tracing::info!(reason = %reason, "Device reported stale by provider");
                (StatusCode::GONE, reason)
            }
            Self::Provider(reason) => {
                tracing::warn!(reason = %reason, "Provider rejected push");
                (StatusCode::BAD_GATEWAY, reason)
            }
            Self::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::TopicNotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::StaleDevice("Unregistered".into()).into_response().status(), StatusCode::GONE);
        assert_eq!(AppError::Provider("timeout".into()).into_response().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Validation(ValidationError::InvalidTopic).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AuthError("Invalid Instance-Token header").into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_storage_error_message_is_not_exposed() {
        let err = AppError::Storage(StorageError::Corrupt { topic: "t".into(), reason: "bad json".into() });
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
