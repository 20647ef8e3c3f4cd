//! Syntactic checks run before any registry or dispatch operation.
//!
//! Checks always run in the same order (type, topic, token) so the first
//! failing check is the one reported and audited.

use crate::domain::registration::ProviderKind;
use thiserror::Error;

/// Topics are SHA-256 digests rendered as hex.
pub const TOPIC_LEN: usize = 64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid type")]
    InvalidType,
    #[error("Invalid topic")]
    InvalidTopic,
    #[error("Invalid token")]
    InvalidToken,
}

/// Parses the provider kind. Matching is case-sensitive.
///
/// # Errors
/// Returns `ValidationError::InvalidType` for anything but `apple` or `firebase`.
pub fn validate_type(kind: &str) -> Result<ProviderKind, ValidationError> {
    kind.parse().map_err(|_| ValidationError::InvalidType)
}

/// # Errors
/// Returns `ValidationError::InvalidTopic` unless the topic is exactly 64 hex characters.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.len() == TOPIC_LEN && topic.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTopic)
    }
}

/// Token formats are provider-proprietary and change over time, so only
/// non-empty ASCII without whitespace is enforced.
///
/// # Errors
/// Returns `ValidationError::InvalidToken` if the token is empty, non-ASCII or contains whitespace.
pub fn validate_token(token: &str) -> Result<(), ValidationError> {
    if !token.is_empty() && token.is_ascii() && !token.bytes().any(|b| b.is_ascii_whitespace()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidToken)
    }
}

/// # Errors
/// Returns the first failing check in type, topic, token order.
pub fn validate_registration(topic: &str, token: &str, kind: &str) -> Result<ProviderKind, ValidationError> {
    let provider = validate_type(kind)?;
    validate_topic(topic)?;
    validate_token(token)?;
    Ok(provider)
}

/// Same pipeline as [`validate_registration`], with the type check skipped when no type is given.
///
/// # Errors
/// Returns the first failing check in type, topic, token order.
pub fn validate_deregistration(
    topic: &str,
    token: &str,
    kind: Option<&str>,
) -> Result<Option<ProviderKind>, ValidationError> {
    let provider = kind.map(validate_type).transpose()?;
    validate_topic(topic)?;
    validate_token(token)?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn test_valid_registration() {
        assert_eq!(validate_registration(TOPIC, "device-token", "apple"), Ok(ProviderKind::Apple));
        assert_eq!(validate_registration(TOPIC, "device-token", "firebase"), Ok(ProviderKind::Firebase));
    }

    #[test]
    fn test_topic_accepts_uppercase_hex() {
        assert!(validate_topic(&TOPIC.to_uppercase()).is_ok());
    }

    #[test]
    fn test_topic_rejects_wrong_length_and_non_hex() {
        assert_eq!(validate_topic(&TOPIC[..63]), Err(ValidationError::InvalidTopic));
        assert_eq!(validate_topic(&format!("{TOPIC}0")), Err(ValidationError::InvalidTopic));
        assert_eq!(validate_topic(&format!("{}g", &TOPIC[..63])), Err(ValidationError::InvalidTopic));
        assert_eq!(validate_topic(""), Err(ValidationError::InvalidTopic));
    }

    #[test]
    fn test_token_rules() {
        assert_eq!(validate_token(""), Err(ValidationError::InvalidToken));
        assert_eq!(validate_token("has space"), Err(ValidationError::InvalidToken));
        assert_eq!(validate_token("tab\there"), Err(ValidationError::InvalidToken));
        assert_eq!(validate_token("line\nbreak"), Err(ValidationError::InvalidToken));
        assert_eq!(validate_token("tökén"), Err(ValidationError::InvalidToken));
        assert!(validate_token("a").is_ok());
        assert!(validate_token("fcm:APA91b-x_y.z").is_ok());
    }

    #[test]
    fn test_type_is_case_sensitive() {
        assert_eq!(validate_type("Apple"), Err(ValidationError::InvalidType));
        assert_eq!(validate_type("android"), Err(ValidationError::InvalidType));
        assert_eq!(validate_type(""), Err(ValidationError::InvalidType));
    }

    #[test]
    fn test_type_is_reported_before_topic_and_token() {
        for _ in 0..3 {
            assert_eq!(validate_registration("not-hex", "bad token", "ios"), Err(ValidationError::InvalidType));
        }
    }

    #[test]
    fn test_topic_is_reported_before_token() {
        assert_eq!(validate_registration("not-hex", "bad token", "apple"), Err(ValidationError::InvalidTopic));
        assert_eq!(validate_registration(TOPIC, "bad token", "apple"), Err(ValidationError::InvalidToken));
    }

    #[test]
    fn test_deregistration_type_is_optional() {
        assert_eq!(validate_deregistration(TOPIC, "tok", None), Ok(None));
        assert_eq!(validate_deregistration(TOPIC, "tok", Some("firebase")), Ok(Some(ProviderKind::Firebase)));
        assert_eq!(validate_deregistration("zz", "tok", Some("nope")), Err(ValidationError::InvalidType));
        assert_eq!(validate_deregistration("zz", "tok", None), Err(ValidationError::InvalidTopic));
    }
}
