use crate::config::RegistryConfig;
use crate::services::audit::AuditService;
use crate::services::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::Instrument;

/// Compacts expired registrations and keeps the registered-device gauges in line with the store.
///
/// Resyncs run at startup, on a fixed interval, and whenever a register/deregister
/// was audited. Requests arriving during a scan collapse into one follow-up scan.
#[derive(Debug)]
pub struct RegistryMaintenanceWorker {
    registry: Registry,
    audit: AuditService,
    resync: Arc<Notify>,
    compaction_interval: Duration,
    resync_interval: Duration,
}

impl RegistryMaintenanceWorker {
    #[must_use]
    pub fn new(registry: Registry, audit: AuditService, config: &RegistryConfig) -> Self {
        Self {
            registry,
            resync: audit.resync_signal(),
            audit,
            compaction_interval: Duration::from_secs(config.compaction_interval_secs.max(1)),
            resync_interval: Duration::from_secs(config.resync_interval_secs.max(1)),
        }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut compaction = tokio::time::interval(self.compaction_interval);
        let mut resync = tokio::time::interval(self.resync_interval);
        compaction.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = compaction.tick() => {
                    self.compact().instrument(tracing::debug_span!("registry_compaction_iteration")).await;
                }
                _ = resync.tick() => {
                    self.resync_gauges().instrument(tracing::debug_span!("gauge_resync_iteration")).await;
                }
                () = self.resync.notified() => {
                    self.resync_gauges().instrument(tracing::debug_span!("gauge_resync_requested")).await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Registry maintenance loop shutting down...");
    }

    pub async fn compact(&self) {
        match self.registry.purge_expired().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Purged expired registrations"),
            Err(e) => tracing::error!(error = %e, "Registry compaction failed"),
        }
    }

    pub async fn resync_gauges(&self) {
        if let Err(e) = self.audit.resync_gauges().await {
            tracing::error!(error = %e, "Registered device gauge resync failed");
        }
    }
}
