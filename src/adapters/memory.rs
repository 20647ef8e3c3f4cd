use crate::domain::registration::{ProviderCounts, RegistrationEntry};
use crate::error::StorageError;
use crate::services::registry::RegistryStore;
use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

/// In-process registry store. Entries do not survive a restart.
///
/// Expired entries stay in the map until `purge_expired` runs; reads filter them out.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    entries: DashMap<String, RegistrationEntry>,
}

impl MemoryRegistryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn put(&self, entry: RegistrationEntry) -> Result<(), StorageError> {
        self.entries.insert(entry.topic.clone(), entry);
        Ok(())
    }

    async fn get(&self, topic: &str) -> Result<Option<RegistrationEntry>, StorageError> {
        Ok(self.entries.get(topic).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, topic: &str) -> Result<(), StorageError> {
        self.entries.remove(topic);
        Ok(())
    }

    async fn count_live(&self, now: OffsetDateTime) -> Result<ProviderCounts, StorageError> {
        let mut counts = ProviderCounts::default();
        for entry in self.entries.iter().filter(|entry| !entry.is_expired_at(now)) {
            counts.add(entry.provider);
        }
        Ok(counts)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(u64::try_from(before.saturating_sub(self.entries.len())).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
