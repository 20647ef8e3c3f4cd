use crate::config::{HealthConfig, StorageBackend};
use crate::services::registry::Registry;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct HealthService {
    registry: Registry,
    backend: StorageBackend,
    config: HealthConfig,
}

impl HealthService {
    #[must_use]
    pub const fn new(registry: Registry, backend: StorageBackend, config: HealthConfig) -> Self {
        Self { registry, backend, config }
    }

    #[must_use]
    pub const fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Checks registry store connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_registry(&self) -> Result<(), String> {
        let registry_timeout = Duration::from_millis(self.config.registry_timeout_ms);

        match timeout(registry_timeout, self.registry.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Registry store connection failed: {e}")),
            Err(_) => Err("Registry store connection timed out".to_string()),
        }
    }
}
