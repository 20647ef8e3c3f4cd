use crate::config::RegistryConfig;
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;

pub mod registry_store;

pub use registry_store::ValkeyRegistryStore;

#[derive(Debug, Clone)]
pub struct RedisClient {
    manager: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to Valkey, retrying with exponential backoff until the retry budget is spent.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every connection attempt fails.
    pub async fn connect(config: &RegistryConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.valkey_url.as_str())?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.connect_min_backoff_ms))
            .with_max_delay(Duration::from_secs(config.connect_max_backoff_secs))
            .with_max_times(config.connect_max_retries);

        let manager = (|| async { client.get_connection_manager().await })
            .retry(retry_strategy)
            .notify(|e, duration| {
                tracing::warn!(error = %e, "Valkey connection failed, retrying in {:?}", duration);
            })
            .await?;

        tracing::info!("Connected to Valkey");
        Ok(Self { manager })
    }

    /// Returns a multiplexed connection handle; cloning is cheap.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.manager.clone()
    }

    /// Pings the server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
