use crate::domain::notification::Notification;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default, rename = "call-id")]
    pub call_id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, rename = "from-uri")]
    pub from_uri: Option<String>,
    #[serde(default, rename = "display-name")]
    pub display_name: Option<String>,
}

impl From<SendRequest> for Notification {
    fn from(req: SendRequest) -> Self {
        Self {
            call_id: req.call_id,
            uuid: req.uuid,
            topic: req.topic,
            kind: req.kind,
            from_uri: req.from_uri,
            display_name: req.display_name,
        }
    }
}
