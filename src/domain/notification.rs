use time::OffsetDateTime;

/// A call notification as requested by the caller, before the topic is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub call_id: String,
    pub uuid: String,
    pub topic: String,
    /// Requested provider, kept raw so unknown values can still be audited.
    pub kind: String,
    pub from_uri: Option<String>,
    pub display_name: Option<String>,
}

/// Provider-independent content of a push. Adapters turn this into their own payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub call_id: String,
    pub uuid: String,
    pub from_uri: String,
    pub display_name: String,
    pub sent_at: OffsetDateTime,
}

impl PushMessage {
    #[must_use]
    pub fn from_notification(notification: &Notification, sent_at: OffsetDateTime) -> Self {
        Self {
            call_id: notification.call_id.clone(),
            uuid: notification.uuid.clone(),
            from_uri: notification.from_uri.clone().unwrap_or_default(),
            display_name: notification.display_name.clone().unwrap_or_default(),
            sent_at,
        }
    }
}
