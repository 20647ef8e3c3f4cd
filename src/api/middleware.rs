use crate::api::AppState;
use crate::error::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use subtle::ConstantTimeEq;

pub const INSTANCE_TOKEN_HEADER: &str = "Instance-Token";

/// Proof that the caller presented the configured instance token.
#[derive(Debug)]
pub struct InstanceToken;

impl FromRequestParts<AppState> for InstanceToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(INSTANCE_TOKEN_HEADER)
            .filter(|value| !value.is_empty())
            .ok_or(AppError::AuthError("Instance-Token header required"))?;

        if !token_matches(header.as_bytes(), state.instance_token.as_bytes()) {
            return Err(AppError::AuthError("Invalid Instance-Token header"));
        }

        Ok(Self)
    }
}

/// Compares in time independent of where the first mismatching byte is.
fn token_matches(presented: &[u8], expected: &[u8]) -> bool {
    bool::from(presented.ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches_only_exact_value() {
        assert!(token_matches(b"instance-secret", b"instance-secret"));
        assert!(!token_matches(b"instance-secreT", b"instance-secret"));
        assert!(!token_matches(b"instance", b"instance-secret"));
        assert!(!token_matches(b"instance-secret-and-more", b"instance-secret"));
        assert!(!token_matches(b"", b"instance-secret"));
    }
}
