use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Send,
    Register,
    Deregister,
    Invalid,
}

/// Event-specific part of an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum AuditEvent {
    Send { provider: String, topic: String, call_id: String, uuid: String },
    Register { provider: String, token: String, topic: String },
    Deregister { provider: String, token: String, topic: String },
    Invalid { endpoint: String, message: String },
}

impl AuditEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Send { .. } => EventKind::Send,
            Self::Register { .. } => EventKind::Register,
            Self::Deregister { .. } => EventKind::Deregister,
            Self::Invalid { .. } => EventKind::Invalid,
        }
    }

    /// Provider string as requested by the caller; empty for malformed-request events.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Send { provider, .. } | Self::Register { provider, .. } | Self::Deregister { provider, .. } => {
                provider
            }
            Self::Invalid { .. } => "",
        }
    }
}

/// One immutable entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub event: AuditEvent,
    pub result: AuditResult,
    pub detail: String,
}

impl AuditRecord {
    #[must_use]
    pub fn new(event: AuditEvent, result: AuditResult, detail: impl Into<String>) -> Self {
        Self { timestamp: OffsetDateTime::now_utc(), event, result, detail: detail.into() }
    }

    #[must_use]
    pub fn success(event: AuditEvent, detail: impl Into<String>) -> Self {
        Self::new(event, AuditResult::Success, detail)
    }

    #[must_use]
    pub fn error(event: AuditEvent, detail: impl Into<String>) -> Self {
        Self::new(event, AuditResult::Error, detail)
    }

    /// Malformed request that never reached validation or dispatch.
    #[must_use]
    pub fn invalid(endpoint: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::error(AuditEvent::Invalid { endpoint: endpoint.to_string(), message: message.clone() }, message)
    }
}
