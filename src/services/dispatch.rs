use crate::adapters::push::{PushError, PushProvider};
use crate::domain::audit::{AuditEvent, AuditRecord};
use crate::domain::notification::{Notification, PushMessage};
use crate::domain::registration::{Lookup, ProviderKind, RegistrationEntry};
use crate::error::{AppError, Result};
use crate::services::audit::AuditService;
use crate::services::registry::Registry;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::Instrument;

/// Resolves a topic to its device and pushes through the requested provider.
///
/// Every call ends in exactly one `send` audit record, written before the result is returned.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Registry,
    apple: Arc<dyn PushProvider>,
    firebase: Arc<dyn PushProvider>,
    audit: AuditService,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Registry,
        apple: Arc<dyn PushProvider>,
        firebase: Arc<dyn PushProvider>,
        audit: AuditService,
    ) -> Self {
        Self { registry, apple, firebase, audit }
    }

    /// Runs the dispatch on its own task so a dropped caller cannot interrupt
    /// the registry update that follows a provider answer.
    ///
    /// # Errors
    /// Returns `AppError::TopicNotFound`, `AppError::InvalidNotificationType`,
    /// `AppError::StaleDevice`, `AppError::Provider` or `AppError::Storage`.
    #[tracing::instrument(skip_all, fields(topic = %notification.topic, call_id = %notification.call_id))]
    pub async fn send(&self, notification: Notification) -> Result<String> {
        let this = self.clone();
        tokio::spawn(async move { this.dispatch(notification).await }.in_current_span()).await.map_err(|e| {
            tracing::error!(error = %e, "Dispatch task failed");
            AppError::Internal
        })?
    }

    async fn dispatch(&self, notification: Notification) -> Result<String> {
        let event = AuditEvent::Send {
            provider: notification.kind.clone(),
            topic: notification.topic.clone(),
            call_id: notification.call_id.clone(),
            uuid: notification.uuid.clone(),
        };

        let entry = match self.registry.get(&notification.topic).await {
            Ok(Lookup::Live(entry)) => entry,
            Ok(lookup @ (Lookup::NotFound | Lookup::Expired { .. })) => {
                if let Lookup::Expired { expired_at } = lookup {
                    tracing::debug!(%expired_at, "Registration expired");
                } else {
                    tracing::debug!("No registration for topic");
                }
                self.audit.record(AuditRecord::error(event, AppError::TopicNotFound.to_string()));
                return Err(AppError::TopicNotFound);
            }
            Err(e) => {
                self.audit.record(AuditRecord::error(event, e.to_string()));
                return Err(e.into());
            }
        };

        let provider = match notification.kind.parse::<ProviderKind>() {
            Ok(ProviderKind::Apple) => &self.apple,
            Ok(ProviderKind::Firebase) => &self.firebase,
            Err(_) => {
                self.audit.record(AuditRecord::error(event, AppError::InvalidNotificationType.to_string()));
                return Err(AppError::InvalidNotificationType);
            }
        };

        let message = PushMessage::from_notification(&notification, OffsetDateTime::now_utc());
        match provider.send_push(&entry.token, &message).await {
            Ok(message_id) => {
                self.refresh(&entry).await;
                tracing::info!(provider = %provider.kind(), "Push delivered");
                self.audit.record(AuditRecord::success(event, message_id.clone()));
                Ok(message_id)
            }
            Err(PushError::Unregistered(reason)) => {
                let cleanup = self.registry.delete(&entry.topic).await;
                self.audit.record(AuditRecord::error(event, reason.clone()));
                match cleanup {
                    Ok(()) => {
                        tracing::info!(provider = %provider.kind(), "Removed stale registration");
                        Err(AppError::StaleDevice(reason))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e @ (PushError::Rejected(_) | PushError::Transport(_))) => {
                let reason = e.to_string();
                self.audit.record(AuditRecord::error(event, reason.clone()));
                Err(AppError::Provider(reason))
            }
        }
    }

    async fn refresh(&self, entry: &RegistrationEntry) {
        if let Err(e) = self.registry.upsert(&entry.topic, &entry.token, entry.provider).await {
            tracing::warn!(error = %e, "Failed to refresh registration TTL after delivery");
        }
    }
}
