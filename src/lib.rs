#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::audit::AuditLogWriter;
use crate::adapters::push::{ApnsPushProvider, FcmPushProvider, PushProvider};
use crate::api::ServiceContainer;
use crate::config::{Config, MAX_TTL_DAYS, StorageBackend};
use crate::services::audit::{AuditService, AuditSink, PushMetrics};
use crate::services::dispatch::Dispatcher;
use crate::services::health_service::HealthService;
use crate::services::registration_service::RegistrationService;
use crate::services::registry::{Registry, RegistryStore};
use crate::workers::RegistryMaintenanceWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Wires the gateway from configuration, letting callers swap any collaborator.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn RegistryStore>>,
    apple: Option<Arc<dyn PushProvider>>,
    firebase: Option<Arc<dyn PushProvider>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
}

/// Fully wired services plus the background tasks they depend on.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub metrics: PushMetrics,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    pub registry_maintenance: RegistryMaintenanceWorker,
    pub audit_writer: Option<AuditLogWriter>,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);

        tasks.push(tokio::spawn(
            self.registry_maintenance.run(shutdown_rx.clone()).instrument(tracing::info_span!("registry_maintenance")),
        ));

        if let Some(writer) = self.audit_writer {
            tasks.push(tokio::spawn(writer.run(shutdown_rx).instrument(tracing::info_span!("audit_log_writer"))));
        }

        tasks
    }
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, store: None, apple: None, firebase: None, audit_sink: None }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_apple_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.apple = Some(provider);
        self
    }

    #[must_use]
    pub fn with_firebase_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.firebase = Some(provider);
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Builds every service, creating the collaborators that were not injected.
    ///
    /// # Errors
    /// Returns an error if the TTL is out of range, Valkey is unreachable,
    /// a provider key cannot be loaded, or the audit file cannot be opened.
    pub async fn build(self) -> anyhow::Result<App> {
        let config = self.config;
        anyhow::ensure!(
            (1..=MAX_TTL_DAYS).contains(&config.registry.ttl_days),
            "registry TTL must be between 1 and {} days, got {}",
            MAX_TTL_DAYS,
            config.registry.ttl_days
        );

        let store: Arc<dyn RegistryStore> = match self.store {
            Some(store) => store,
            None => match config.registry.backend {
                StorageBackend::Valkey => {
                    let redis = adapters::redis::RedisClient::connect(&config.registry).await?;
                    Arc::new(adapters::redis::ValkeyRegistryStore::new(redis, config.registry.key_prefix.clone()))
                }
                StorageBackend::Memory => Arc::new(adapters::memory::MemoryRegistryStore::new()),
            },
        };

        let apple: Arc<dyn PushProvider> = match self.apple {
            Some(provider) => provider,
            None => Arc::new(ApnsPushProvider::from_config(&config.apple)?),
        };
        let firebase: Arc<dyn PushProvider> = match self.firebase {
            Some(provider) => provider,
            None => Arc::new(FcmPushProvider::from_config(&config.firebase)?),
        };

        let (audit_sink, audit_writer) = match self.audit_sink {
            Some(sink) => (sink, None),
            None => {
                let (sink, writer) = adapters::audit::json_lines(&config.audit).await?;
                let sink: Arc<dyn AuditSink> = Arc::new(sink);
                (sink, Some(writer))
            }
        };

        let registry = Registry::new(store, time::Duration::days(config.registry.ttl_days));
        let metrics = PushMetrics::new();
        let audit = AuditService::new(audit_sink, registry.clone(), metrics.clone());

        let registration_service = RegistrationService::new(registry.clone(), audit.clone());
        let dispatcher = Dispatcher::new(registry.clone(), apple, firebase, audit.clone());
        let health_service = HealthService::new(registry.clone(), config.registry.backend, config.health.clone());
        let registry_maintenance = RegistryMaintenanceWorker::new(registry, audit.clone(), &config.registry);

        Ok(App {
            services: ServiceContainer { registration_service, dispatcher, audit },
            health_service,
            metrics,
            workers: Workers { registry_maintenance, audit_writer },
        })
    }
}

/// Routes panics through tracing so they reach the configured log output.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        let location = panic_info.location().map(ToString::to_string).unwrap_or_default();

        tracing::error!(panic.payload = %payload, panic.location = %location, "Application panicked");
    }));
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
            () = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }

        let _ = shutdown_tx.send(true);
    });
}
