use crate::adapters::push::{PushError, PushProvider};
use crate::config::FcmConfig;
use crate::domain::notification::PushMessage;
use crate::domain::registration::ProviderKind;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::Mutex;

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Access tokens are renewed this long before Google expires them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Only the error code the Admin SDK reports for dead registrations counts as stale.
pub const UNREGISTERED_CODE: &str = "registration-token-not-registered";

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: String,
    private_key: String,
    client_email: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

struct CachedAccessToken {
    token: String,
    valid_until: Instant,
}

/// Exchanges a signed service-account assertion for OAuth2 access tokens.
struct AccessTokenSource {
    http: reqwest::Client,
    key: EncodingKey,
    client_email: String,
    token_uri: String,
    cached: Mutex<Option<CachedAccessToken>>,
}

impl std::fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl AccessTokenSource {
    async fn current(&self) -> Result<String, PushError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.valid_until
        {
            return Ok(token.token.clone());
        }

        let fresh = self.exchange().await?;
        let token = fresh.access_token.clone();
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedAccessToken { token: fresh.access_token, valid_until: Instant::now() + lifetime });
        Ok(token)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn exchange(&self) -> Result<AccessTokenResponse, PushError> {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| PushError::Transport(format!("Failed to sign service account assertion: {e}")))?;

        let response = self
            .http
            .post(&self.token_uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("grant_type={JWT_BEARER_GRANT}&assertion={assertion}"))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected(format!("OAuth token exchange failed ({status}): {body}")));
        }

        response.json::<AccessTokenResponse>().await.map_err(|e| PushError::Transport(e.to_string()))
    }
}

/// Firebase Cloud Messaging HTTP v1 client. Messages are addressed to the stored device token.
#[derive(Debug)]
pub struct FcmPushProvider {
    client: reqwest::Client,
    send_url: String,
    tokens: AccessTokenSource,
}

impl FcmPushProvider {
    /// Builds the client from the service account file referenced in the config.
    ///
    /// # Errors
    /// Returns an error if the service account file is unreadable or holds an invalid RSA key.
    pub fn from_config(config: &FcmConfig) -> anyhow::Result<Self> {
        let raw = std::fs::read(&config.firebase_credentials).with_context(|| {
            format!("Failed to read service account file {}", config.firebase_credentials.display())
        })?;
        let account: ServiceAccountKey = serde_json::from_slice(&raw).context("Invalid service account file")?;
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).context("Invalid service account key")?;

        let client = reqwest::Client::builder().timeout(Duration::from_secs(config.firebase_timeout_secs)).build()?;
        let project_id = config.firebase_project_id.clone().unwrap_or(account.project_id);
        let send_url =
            format!("{}/v1/projects/{project_id}/messages:send", config.firebase_endpoint.trim_end_matches('/'));

        Ok(Self {
            client: client.clone(),
            send_url,
            tokens: AccessTokenSource {
                http: client,
                key,
                client_email: account.client_email,
                token_uri: account.token_uri,
                cached: Mutex::new(None),
            },
        })
    }
}

/// High-priority data message; the app only needs to be woken up.
#[must_use]
pub fn data_message(token: &str, message: &PushMessage) -> serde_json::Value {
    let timestamp_ms = message.sent_at.unix_timestamp_nanos() / 1_000_000;

    json!({
        "token": token,
        "android": { "priority": "high" },
        "data": {
            "timestamp": timestamp_ms.to_string(),
            "call-id": message.call_id,
            "uuid": message.uuid,
        },
    })
}

/// Admin SDK style code for an FCM v1 error, preferring the FCM-specific detail over the RPC status.
fn error_code(error: &ErrorStatus) -> &'static str {
    let code = error.details.iter().find_map(|d| d.error_code.as_deref()).unwrap_or(error.status.as_str());
    match code {
        "UNREGISTERED" => UNREGISTERED_CODE,
        "INVALID_ARGUMENT" => "invalid-argument",
        "SENDER_ID_MISMATCH" => "mismatched-credential",
        "QUOTA_EXCEEDED" => "message-rate-exceeded",
        "THIRD_PARTY_AUTH_ERROR" => "third-party-auth-error",
        "UNAVAILABLE" => "server-unavailable",
        "INTERNAL" => "internal-error",
        _ => "unknown-error",
    }
}

/// Maps an FCM answer to a message name or a classified error.
///
/// # Errors
/// Returns `PushError::Unregistered` when the error description carries
/// [`UNREGISTERED_CODE`], `PushError::Rejected` otherwise.
pub fn classify_response(status: StatusCode, body: &str) -> Result<String, PushError> {
    if status.is_success() {
        return Ok(serde_json::from_str::<SendResponse>(body).map(|r| r.name).unwrap_or_default());
    }

    let description = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{}: {}", error_code(&envelope.error), envelope.error.message),
        Err(_) => format!("unknown-error: http status {}", status.as_u16()),
    };

    if description.contains(UNREGISTERED_CODE) {
        Err(PushError::Unregistered(description))
    } else {
        Err(PushError::Rejected(description))
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Firebase
    }

    #[tracing::instrument(level = "debug", skip_all, fields(call_id = %message.call_id))]
    async fn send_push(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        let access_token = self.tokens.current().await?;

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&json!({ "message": data_message(token, message) }))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_data_message_is_token_addressed_and_high_priority() {
        let message = PushMessage {
            call_id: "call-1".into(),
            uuid: "uuid-1".into(),
            from_uri: String::new(),
            display_name: String::new(),
            sent_at: datetime!(2026-01-01 00:00:00.250 UTC),
        };
        let value = data_message("device-token", &message);
        assert_eq!(value["token"], "device-token");
        assert!(value.get("topic").is_none());
        assert_eq!(value["android"]["priority"], "high");
        assert_eq!(value["data"]["timestamp"], "1767225600250");
        assert_eq!(value["data"]["call-id"], "call-1");
    }

    #[test]
    fn test_classify_success_returns_message_name() {
        let name = classify_response(StatusCode::OK, r#"{"name":"projects/demo/messages/0:123"}"#).unwrap();
        assert_eq!(name, "projects/demo/messages/0:123");
    }

    #[test]
    fn test_classify_unregistered_detail_is_stale() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        let err = classify_response(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(
            matches!(err, PushError::Unregistered(ref d) if d == "registration-token-not-registered: Requested entity was not found.")
        );
    }

    #[test]
    fn test_classify_invalid_argument_is_not_stale() {
        let body = r#"{"error":{"code":400,"message":"The registration token is not a valid FCM registration token","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, PushError::Rejected(ref d) if d.starts_with("invalid-argument: ")));
    }

    #[test]
    fn test_classify_unparseable_error_body() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, PushError::Rejected(ref d) if d == "unknown-error: http status 502"));
    }
}
