use crate::adapters::push::{PushError, PushProvider};
use crate::config::ApnsConfig;
use crate::domain::notification::PushMessage;
use crate::domain::registration::ProviderKind;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::macros::format_description;

/// APNs rejects provider tokens older than an hour and throttles refreshes under 20 minutes.
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(50 * 60);

#[derive(Serialize)]
struct ProviderTokenClaims<'a> {
    iss: &'a str,
    iat: i64,
}

#[derive(Deserialize)]
struct ApnsErrorBody {
    #[serde(default)]
    reason: String,
}

struct CachedToken {
    jwt: String,
    issued_at: Instant,
}

/// Signs and caches the ES256 provider token sent as the bearer credential.
struct ProviderTokenSigner {
    key: EncodingKey,
    key_id: String,
    team_id: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ProviderTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokenSigner")
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

impl ProviderTokenSigner {
    fn current(&self) -> Result<String, PushError> {
        let mut cached = self.cached.lock().map_err(|_| PushError::Transport("APNs token cache poisoned".into()))?;
        if let Some(token) = cached.as_ref()
            && token.issued_at.elapsed() < TOKEN_REFRESH_AFTER
        {
            return Ok(token.jwt.clone());
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderTokenClaims { iss: &self.team_id, iat: OffsetDateTime::now_utc().unix_timestamp() };
        let jwt = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| PushError::Transport(format!("Failed to sign APNs provider token: {e}")))?;

        tracing::debug!(key_id = %self.key_id, "Issued new APNs provider token");
        *cached = Some(CachedToken { jwt: jwt.clone(), issued_at: Instant::now() });
        Ok(jwt)
    }
}

/// Apple Push Notification service client for VoIP pushes.
#[derive(Debug)]
pub struct ApnsPushProvider {
    client: reqwest::Client,
    base_url: String,
    topic: String,
    signer: ProviderTokenSigner,
}

impl ApnsPushProvider {
    /// Builds the client from the `.p8` signing key referenced in the config.
    ///
    /// # Errors
    /// Returns an error if the key file cannot be read or is not a valid EC key.
    pub fn from_config(config: &ApnsConfig) -> anyhow::Result<Self> {
        let pem = std::fs::read(&config.apple_credentials)
            .with_context(|| format!("Failed to read APNs key {}", config.apple_credentials.display()))?;
        let key = EncodingKey::from_ec_pem(&pem).context("Invalid APNs signing key")?;

        let client = reqwest::Client::builder().timeout(Duration::from_secs(config.apple_timeout_secs)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            topic: config.apple_topic.clone(),
            signer: ProviderTokenSigner {
                key,
                key_id: config.apple_key_id.clone(),
                team_id: config.apple_team_id.clone(),
                cached: Mutex::new(None),
            },
        })
    }
}

/// VoIP payload woken apps use to set up the incoming call.
#[must_use]
pub fn voip_payload(message: &PushMessage) -> serde_json::Value {
    let send_time = message
        .sent_at
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default();

    json!({
        "aps": {
            "sound": "",
            "call-id": message.call_id,
            "uuid": message.uuid,
            "send-time": send_time,
        },
        "from-uri": message.from_uri,
        "display-name": message.display_name,
        "pn_ttl": 100,
        "customPayload": {},
    })
}

/// Maps an APNs answer to a delivery id or a classified error. Status 410 is the only stale signal.
///
/// # Errors
/// Returns `PushError::Unregistered` for 410 and `PushError::Rejected` for any other non-200 status.
pub fn classify_response(status: StatusCode, apns_id: Option<&str>, body: &str) -> Result<String, PushError> {
    if status == StatusCode::OK {
        return Ok(apns_id.unwrap_or_default().to_string());
    }

    let reason = serde_json::from_str::<ApnsErrorBody>(body)
        .ok()
        .map(|body| body.reason)
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    if status == StatusCode::GONE { Err(PushError::Unregistered(reason)) } else { Err(PushError::Rejected(reason)) }
}

#[async_trait]
impl PushProvider for ApnsPushProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    #[tracing::instrument(level = "debug", skip_all, fields(call_id = %message.call_id))]
    async fn send_push(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        let jwt = self.signer.current()?;

        let response = self
            .client
            .post(format!("{}/3/device/{token}", self.base_url))
            .bearer_auth(jwt)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "voip")
            .header("apns-priority", "10")
            .json(&voip_payload(message))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        let apns_id = response.headers().get("apns-id").and_then(|v| v.to_str().ok()).map(str::to_owned);
        let body = response.text().await.unwrap_or_default();

        classify_response(status, apns_id.as_deref(), &body)
    }
}
