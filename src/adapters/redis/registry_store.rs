use crate::adapters::redis::RedisClient;
use crate::domain::registration::{ProviderCounts, ProviderKind, RegistrationEntry};
use crate::error::StorageError;
use crate::services::registry::RegistryStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const SCAN_BATCH: usize = 500;

/// Value stored under each topic key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRegistration {
    token: String,
    provider: ProviderKind,
    /// Unix milliseconds; mirrors the key's PXAT expiry.
    expires_at: i64,
}

/// Registry store keyed as `<prefix><topic>`, relying on native key expiry.
#[derive(Debug, Clone)]
pub struct ValkeyRegistryStore {
    redis: RedisClient,
    key_prefix: String,
}

impl ValkeyRegistryStore {
    #[must_use]
    pub const fn new(redis: RedisClient, key_prefix: String) -> Self {
        Self { redis, key_prefix }
    }

    fn key(&self, topic: &str) -> String {
        format!("{}{topic}", self.key_prefix)
    }

    fn topic_from_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.key_prefix.as_str()).unwrap_or(key)
    }

    fn decode(topic: &str, raw: &str) -> Result<RegistrationEntry, StorageError> {
        let stored: StoredRegistration = serde_json::from_str(raw)
            .map_err(|e| StorageError::Corrupt { topic: topic.to_string(), reason: e.to_string() })?;
        let expires_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(stored.expires_at) * 1_000_000)
            .map_err(|e| StorageError::Corrupt { topic: topic.to_string(), reason: e.to_string() })?;

        Ok(RegistrationEntry { topic: topic.to_string(), token: stored.token, provider: stored.provider, expires_at })
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

#[async_trait]
impl RegistryStore for ValkeyRegistryStore {
    async fn put(&self, entry: RegistrationEntry) -> Result<(), StorageError> {
        let expires_at = unix_millis(entry.expires_at);
        let value = serde_json::to_string(&StoredRegistration {
            token: entry.token,
            provider: entry.provider,
            expires_at,
        })
        .map_err(|e| StorageError::Corrupt { topic: entry.topic.clone(), reason: e.to_string() })?;

        // Single SET: readers see the old or the new value, and the key expires on its own.
        let mut conn = self.redis.connection();
        redis::cmd("SET")
            .arg(self.key(&entry.topic))
            .arg(value)
            .arg("PXAT")
            .arg(expires_at)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, topic: &str) -> Result<Option<RegistrationEntry>, StorageError> {
        let mut conn = self.redis.connection();
        let raw: Option<String> = redis::cmd("GET").arg(self.key(topic)).query_async(&mut conn).await?;
        raw.map(|raw| Self::decode(topic, &raw)).transpose()
    }

    async fn delete(&self, topic: &str) -> Result<(), StorageError> {
        let mut conn = self.redis.connection();
        redis::cmd("DEL").arg(self.key(topic)).query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn count_live(&self, now: OffsetDateTime) -> Result<ProviderCounts, StorageError> {
        let mut conn = self.redis.connection();
        let pattern = format!("{}*", self.key_prefix);
        let mut counts = ProviderCounts::default();
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;
                for (key, raw) in keys.iter().zip(values) {
                    // Keys can expire between SCAN and MGET.
                    let Some(raw) = raw else { continue };
                    match Self::decode(self.topic_from_key(key), &raw) {
                        Ok(entry) if !entry.is_expired_at(now) => counts.add(entry.provider),
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "Skipping unreadable registry record"),
                    }
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(counts)
    }

    async fn purge_expired(&self, _now: OffsetDateTime) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.redis.ping().await?;
        Ok(())
    }
}
