pub mod health;
pub mod notifications;
pub mod registrations;

use serde::{Deserialize, Serialize};

/// Envelope of every public API answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
