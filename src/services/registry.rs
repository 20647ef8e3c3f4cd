use crate::domain::registration::{Lookup, ProviderCounts, ProviderKind, RegistrationEntry};
use crate::error::StorageError;
use async_trait::async_trait;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Backing store for topic registrations.
///
/// Implementations must make `put` atomic per topic: a concurrent `get`
/// observes either the previous entry or the new one.
#[async_trait]
pub trait RegistryStore: Send + Sync + std::fmt::Debug {
    async fn put(&self, entry: RegistrationEntry) -> Result<(), StorageError>;

    /// Returns the stored entry, expired or not. A store may already have dropped expired entries.
    async fn get(&self, topic: &str) -> Result<Option<RegistrationEntry>, StorageError>;

    /// Deleting an absent topic is not an error.
    async fn delete(&self, topic: &str) -> Result<(), StorageError>;

    /// Counts entries still live at `now`. Not required to be a consistent snapshot.
    async fn count_live(&self, now: OffsetDateTime) -> Result<ProviderCounts, StorageError>;

    /// Physically removes entries expired at `now`, returning how many were dropped.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}

/// Topic → device token mapping with a fixed TTL refreshed on every write.
#[derive(Clone, Debug)]
pub struct Registry {
    store: Arc<dyn RegistryStore>,
    ttl: Duration,
}

impl Registry {
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Writes or refreshes the entry for `topic`, expiring one TTL from now.
    ///
    /// # Errors
    /// Returns `StorageError` if the store write fails.
    #[tracing::instrument(level = "debug", skip(self, token), err)]
    pub async fn upsert(
        &self,
        topic: &str,
        token: &str,
        provider: ProviderKind,
    ) -> Result<RegistrationEntry, StorageError> {
        let entry = RegistrationEntry {
            topic: topic.to_string(),
            token: token.to_string(),
            provider,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        self.store.put(entry.clone()).await?;
        Ok(entry)
    }

    /// # Errors
    /// Returns `StorageError` if the store read fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn get(&self, topic: &str) -> Result<Lookup, StorageError> {
        let lookup = match self.store.get(topic).await? {
            None => Lookup::NotFound,
            Some(entry) if entry.is_expired_at(OffsetDateTime::now_utc()) => {
                Lookup::Expired { expired_at: entry.expires_at }
            }
            Some(entry) => Lookup::Live(entry),
        };
        Ok(lookup)
    }

    /// # Errors
    /// Returns `StorageError` if the store delete fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn delete(&self, topic: &str) -> Result<(), StorageError> {
        self.store.delete(topic).await
    }

    /// Full scan of live entries. Only meant for gauge resync.
    ///
    /// # Errors
    /// Returns `StorageError` if the scan fails.
    pub async fn count_by_provider(&self) -> Result<ProviderCounts, StorageError> {
        self.store.count_live(OffsetDateTime::now_utc()).await
    }

    /// # Errors
    /// Returns `StorageError` if the compaction fails.
    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.store.purge_expired(OffsetDateTime::now_utc()).await
    }

    /// # Errors
    /// Returns `StorageError` if the store is unreachable.
    pub async fn ping(&self) -> Result<(), StorageError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRegistryStore;

    const TOPIC: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn registry(store: Arc<MemoryRegistryStore>) -> Registry {
        Registry::new(store, Duration::days(180))
    }

    #[tokio::test]
    async fn test_upsert_then_get_sets_full_ttl() {
        let registry = registry(Arc::new(MemoryRegistryStore::new()));
        let before = OffsetDateTime::now_utc();

        registry.upsert(TOPIC, "token-1", ProviderKind::Apple).await.unwrap();

        let entry = registry.get(TOPIC).await.unwrap().into_live().unwrap();
        assert_eq!(entry.token, "token-1");
        assert_eq!(entry.provider, ProviderKind::Apple);
        let remaining = entry.expires_at - before;
        assert!(remaining >= Duration::days(180));
        assert!(remaining < Duration::days(180) + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_token_and_provider() {
        let registry = registry(Arc::new(MemoryRegistryStore::new()));
        registry.upsert(TOPIC, "token-1", ProviderKind::Apple).await.unwrap();
        registry.upsert(TOPIC, "token-2", ProviderKind::Firebase).await.unwrap();

        let entry = registry.get(TOPIC).await.unwrap().into_live().unwrap();
        assert_eq!(entry.token, "token-2");
        assert_eq!(entry.provider, ProviderKind::Firebase);
        assert_eq!(registry.count_by_provider().await.unwrap(), ProviderCounts { apple: 0, firebase: 1 });
    }

    #[tokio::test]
    async fn test_expired_entry_is_reported_as_expired() {
        let store = Arc::new(MemoryRegistryStore::new());
        let expired_at = OffsetDateTime::now_utc() - Duration::minutes(1);
        store
            .put(RegistrationEntry {
                topic: TOPIC.into(),
                token: "old".into(),
                provider: ProviderKind::Firebase,
                expires_at: expired_at,
            })
            .await
            .unwrap();
        let registry = registry(store);

        assert_eq!(registry.get(TOPIC).await.unwrap(), Lookup::Expired { expired_at });
        assert_eq!(registry.count_by_provider().await.unwrap(), ProviderCounts::default());
    }

    #[tokio::test]
    async fn test_get_unknown_topic_is_not_found() {
        let registry = registry(Arc::new(MemoryRegistryStore::new()));
        assert_eq!(registry.get(TOPIC).await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let registry = registry(Arc::new(MemoryRegistryStore::new()));
        registry.delete(TOPIC).await.unwrap();

        registry.upsert(TOPIC, "token-1", ProviderKind::Apple).await.unwrap();
        registry.delete(TOPIC).await.unwrap();
        registry.delete(TOPIC).await.unwrap();

        assert_eq!(registry.get(TOPIC).await.unwrap(), Lookup::NotFound);
    }
}
