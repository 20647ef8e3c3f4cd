use crate::domain::notification::PushMessage;
use crate::domain::registration::ProviderKind;
use async_trait::async_trait;
use thiserror::Error;

pub mod apns;
pub mod fcm;

pub use apns::ApnsPushProvider;
pub use fcm::FcmPushProvider;

/// Classified provider failure. Only `Unregistered` means the stored token must be dropped.
#[derive(Error, Debug)]
pub enum PushError {
    /// The provider reports the device as no longer reachable.
    #[error("{0}")]
    Unregistered(String),
    /// The provider answered but refused the push.
    #[error("{0}")]
    Rejected(String),
    /// The request never produced a provider answer.
    #[error("{0}")]
    Transport(String),
}

#[async_trait]
pub trait PushProvider: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ProviderKind;

    /// Sends one push to a device token, returning the provider's message identifier.
    ///
    /// # Errors
    /// Returns `PushError::Unregistered` if the token is stale and should be removed.
    async fn send_push(&self, token: &str, message: &PushMessage) -> Result<String, PushError>;
}
