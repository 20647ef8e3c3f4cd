use crate::domain::audit::{AuditRecord, AuditResult, EventKind};
use crate::domain::registration::ProviderCounts;
use crate::error::StorageError;
use crate::services::registry::Registry;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

pub mod metrics;

pub use metrics::PushMetrics;

#[derive(Error, Debug)]
pub enum AuditSinkError {
    #[error("Audit buffer is full")]
    Full,
    #[error("Audit sink is closed")]
    Closed,
    #[error("Failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable destination of the audit trail.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Hands one record to the sink. Implementations must not block.
    ///
    /// # Errors
    /// Returns `AuditSinkError` if the record could not be accepted.
    fn write(&self, record: &AuditRecord) -> Result<(), AuditSinkError>;
}

/// Single writer of the audit trail and of the push metrics.
#[derive(Clone, Debug)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
    registry: Registry,
    metrics: PushMetrics,
    resync: Arc<Notify>,
}

impl AuditService {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, registry: Registry, metrics: PushMetrics) -> Self {
        Self { sink, registry, metrics, resync: Arc::new(Notify::new()) }
    }

    /// Appends a record and applies the metric update it implies.
    ///
    /// A record the sink cannot take is dropped with a warning; metrics are updated regardless.
    pub fn record(&self, record: AuditRecord) {
        if let Err(e) = self.sink.write(&record) {
            tracing::warn!(error = %e, event = ?record.event.kind(), "Dropping audit record");
        }

        match record.event.kind() {
            EventKind::Send => {
                let provider = record.event.provider().parse().ok();
                self.metrics.record_send(provider, record.result == AuditResult::Success);
            }
            EventKind::Register | EventKind::Deregister => self.resync.notify_one(),
            EventKind::Invalid => {}
        }
    }

    /// Recounts live registrations and overwrites the registered-device gauges.
    ///
    /// # Errors
    /// Returns `StorageError` if the registry scan fails; gauges keep their previous value.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn resync_gauges(&self) -> Result<ProviderCounts, StorageError> {
        let counts = self.registry.count_by_provider().await?;
        self.metrics.set_registered(counts);
        tracing::debug!(apple = counts.apple, firebase = counts.firebase, "Registered device gauges resynced");
        Ok(counts)
    }

    /// Notified after every register/deregister record; the maintenance worker waits on it.
    #[must_use]
    pub fn resync_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.resync)
    }

    #[must_use]
    pub const fn metrics(&self) -> &PushMetrics {
        &self.metrics
    }
}
