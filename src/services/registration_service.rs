use crate::domain::audit::{AuditEvent, AuditRecord};
use crate::domain::registration::Lookup;
use crate::error::{AppError, Result};
use crate::services::audit::AuditService;
use crate::services::registry::Registry;
use crate::services::validation;

const OK_DETAIL: &str = "ok";
const INVALID_TUPLE_DETAIL: &str = "invalid tuple";

#[derive(Clone, Debug)]
pub struct RegistrationService {
    registry: Registry,
    audit: AuditService,
}

impl RegistrationService {
    #[must_use]
    pub const fn new(registry: Registry, audit: AuditService) -> Self {
        Self { registry, audit }
    }

    /// Binds `topic` to a device token, replacing any previous binding and restarting its TTL.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for malformed input and `AppError::Storage` if the write fails.
    #[tracing::instrument(skip(self, token), fields(provider = %kind))]
    pub async fn register(&self, topic: &str, token: &str, kind: &str) -> Result<()> {
        let event =
            AuditEvent::Register { provider: kind.to_string(), token: token.to_string(), topic: topic.to_string() };

        let provider = match validation::validate_registration(topic, token, kind) {
            Ok(provider) => provider,
            Err(e) => {
                self.audit.record(AuditRecord::error(event, e.to_string()));
                return Err(e.into());
            }
        };

        if let Err(e) = self.registry.upsert(topic, token, provider).await {
            self.audit.record(AuditRecord::error(event, e.to_string()));
            return Err(e.into());
        }

        tracing::info!("Device registered");
        self.audit.record(AuditRecord::success(event, OK_DETAIL));
        Ok(())
    }

    /// Removes the binding of `topic`, provided it still points at `token`.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for malformed input, `AppError::InvalidTuple` when no live
    /// binding of `topic` to `token` exists, and `AppError::Storage` on store failures.
    #[tracing::instrument(skip(self, token), fields(provider = kind.unwrap_or_default()))]
    pub async fn deregister(&self, topic: &str, token: &str, kind: Option<&str>) -> Result<()> {
        let event = AuditEvent::Deregister {
            provider: kind.unwrap_or_default().to_string(),
            token: token.to_string(),
            topic: topic.to_string(),
        };

        if let Err(e) = validation::validate_deregistration(topic, token, kind) {
            self.audit.record(AuditRecord::error(event, e.to_string()));
            return Err(e.into());
        }

        let matches = match self.registry.get(topic).await {
            Ok(Lookup::Live(entry)) => entry.token == token,
            Ok(Lookup::NotFound | Lookup::Expired { .. }) => false,
            Err(e) => {
                self.audit.record(AuditRecord::error(event, e.to_string()));
                return Err(e.into());
            }
        };
        if !matches {
            self.audit.record(AuditRecord::error(event, INVALID_TUPLE_DETAIL));
            return Err(AppError::InvalidTuple);
        }

        if let Err(e) = self.registry.delete(topic).await {
            self.audit.record(AuditRecord::error(event, e.to_string()));
            return Err(e.into());
        }

        tracing::info!("Device deregistered");
        self.audit.record(AuditRecord::success(event, OK_DETAIL));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::MemoryAuditSink;
    use crate::adapters::memory::MemoryRegistryStore;
    use crate::domain::audit::{AuditResult, EventKind};
    use crate::domain::registration::ProviderKind;
    use crate::services::audit::PushMetrics;
    use crate::services::validation::ValidationError;
    use std::sync::Arc;

    const TOPIC: &str = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";

    fn service() -> (RegistrationService, Registry, Arc<MemoryAuditSink>) {
        let registry = Registry::new(Arc::new(MemoryRegistryStore::new()), time::Duration::days(180));
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = AuditService::new(sink.clone(), registry.clone(), PushMetrics::new());
        (RegistrationService::new(registry.clone(), audit), registry, sink)
    }

    #[tokio::test]
    async fn test_register_stores_entry_and_audits() {
        let (service, registry, sink) = service();

        service.register(TOPIC, "device-token", "firebase").await.unwrap();

        let entry = registry.get(TOPIC).await.unwrap().into_live().unwrap();
        assert_eq!(entry.token, "device-token");
        assert_eq!(entry.provider, ProviderKind::Firebase);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event.kind(), EventKind::Register);
        assert_eq!(records[0].result, AuditResult::Success);
        assert_eq!(records[0].detail, "ok");
    }

    #[tokio::test]
    async fn test_register_reports_type_before_topic() {
        let (service, registry, sink) = service();

        for _ in 0..3 {
            let err = service.register("not-hex", "device token", "Apple").await.unwrap_err();
            assert!(matches!(err, AppError::Validation(ValidationError::InvalidType)));
        }

        assert_eq!(registry.count_by_provider().await.unwrap().apple, 0);
        assert!(sink.records().iter().all(|r| r.detail == "Invalid type" && r.event.provider() == "Apple"));
    }

    #[tokio::test]
    async fn test_deregister_requires_matching_token() {
        let (service, registry, sink) = service();
        service.register(TOPIC, "device-token", "apple").await.unwrap();

        let err = service.deregister(TOPIC, "other-token", Some("apple")).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidTuple));
        assert!(registry.get(TOPIC).await.unwrap().into_live().is_some());
        assert_eq!(sink.records().last().unwrap().detail, "invalid tuple");
    }

    #[tokio::test]
    async fn test_deregister_removes_entry() {
        let (service, registry, sink) = service();
        service.register(TOPIC, "device-token", "apple").await.unwrap();

        service.deregister(TOPIC, "device-token", None).await.unwrap();

        assert_eq!(registry.get(TOPIC).await.unwrap(), Lookup::NotFound);
        let last = sink.records().pop().unwrap();
        assert_eq!(last.event.kind(), EventKind::Deregister);
        assert_eq!(last.result, AuditResult::Success);
    }

    #[tokio::test]
    async fn test_deregister_unknown_topic_is_invalid_tuple() {
        let (service, _, _) = service();
        let err = service.deregister(TOPIC, "device-token", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTuple));
    }

    #[tokio::test]
    async fn test_deregister_validates_optional_type_first() {
        let (service, _, _) = service();
        let err = service.deregister("zz", "", Some("huawei")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::InvalidType)));

        let err = service.deregister("zz", "", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::InvalidTopic)));
    }
}
