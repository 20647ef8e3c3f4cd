#![allow(dead_code)]
use async_trait::async_trait;
use fpp_server::adapters::audit::MemoryAuditSink;
use fpp_server::adapters::memory::MemoryRegistryStore;
use fpp_server::adapters::push::{PushError, PushProvider};
use fpp_server::api::MgmtState;
use fpp_server::config::Config;
use fpp_server::domain::audit::AuditRecord;
use fpp_server::domain::notification::PushMessage;
use fpp_server::domain::registration::{ProviderCounts, ProviderKind, RegistrationEntry};
use fpp_server::error::StorageError;
use fpp_server::services::registry::RegistryStore;
use fpp_server::{AppBuilder, telemetry};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub const INSTANCE_TOKEN: &str = "test-instance-token";

/// Topics as clients derive them: the hex SHA-256 of some identity.
pub fn topic(identity: &str) -> String {
    hex::encode(Sha256::digest(identity.as_bytes()))
}

pub fn get_test_config() -> Config {
    use clap::Parser;
    Config::try_parse_from([
        "fpp-server",
        "--instance-token",
        INSTANCE_TOKEN,
        "--backend",
        "memory",
        "--resync-interval-secs",
        "3600",
        "--apple-credentials",
        "tests/fixtures/apns_test_key.p8",
        "--apple-key-id",
        "KEY1234567",
        "--apple-team-id",
        "TEAM123456",
        "--apple-topic",
        "com.example.phone.voip",
        "--apple-environment",
        "sandbox",
        "--firebase-credentials",
        "tests/fixtures/service-account.json",
    ])
    .unwrap()
}

#[derive(Debug, Clone)]
pub enum MockReply {
    Delivered(String),
    Unregistered(String),
    Rejected(String),
    Transport(String),
}

/// Provider double recording every push it is asked to deliver.
#[derive(Debug)]
pub struct MockProvider {
    kind: ProviderKind,
    reply: Mutex<MockReply>,
    per_token: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<(String, PushMessage)>>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply: Mutex::new(MockReply::Delivered(format!("{kind}-message-id"))),
            per_token: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn reply_with(&self, reply: MockReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Overrides the reply for one device token only.
    pub fn reply_for(&self, token: &str, reply: MockReply) {
        self.per_token.lock().unwrap().insert(token.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<(String, PushMessage)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send_push(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        self.calls.lock().unwrap().push((token.to_string(), message.clone()));
        let reply = self.per_token.lock().unwrap().get(token).cloned();
        match reply.unwrap_or_else(|| self.reply.lock().unwrap().clone()) {
            MockReply::Delivered(id) => Ok(id),
            MockReply::Unregistered(reason) => Err(PushError::Unregistered(reason)),
            MockReply::Rejected(reason) => Err(PushError::Rejected(reason)),
            MockReply::Transport(reason) => Err(PushError::Transport(reason)),
        }
    }
}

/// Memory store with switches that make writes, reads or deletes fail.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryRegistryStore,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FaultyStore {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn fault(topic: &str) -> StorageError {
        StorageError::Corrupt { topic: topic.to_string(), reason: "injected fault".into() }
    }
}

#[async_trait]
impl RegistryStore for FaultyStore {
    async fn put(&self, entry: RegistrationEntry) -> Result<(), StorageError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::fault(&entry.topic));
        }
        self.inner.put(entry).await
    }

    async fn get(&self, topic: &str) -> Result<Option<RegistrationEntry>, StorageError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::fault(topic));
        }
        self.inner.get(topic).await
    }

    async fn delete(&self, topic: &str) -> Result<(), StorageError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::fault(topic));
        }
        self.inner.delete(topic).await
    }

    async fn count_live(&self, now: OffsetDateTime) -> Result<ProviderCounts, StorageError> {
        self.inner.count_live(now).await
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        self.inner.purge_expired(now).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }
}

pub struct TestApp {
    pub api_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: Arc<FaultyStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub apple: Arc<MockProvider>,
    pub firebase: Arc<MockProvider>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        telemetry::init_test_telemetry();

        let store = Arc::new(FaultyStore::default());
        let audit = Arc::new(MemoryAuditSink::new());
        let apple = MockProvider::new(ProviderKind::Apple);
        let firebase = MockProvider::new(ProviderKind::Firebase);

        let app = AppBuilder::new(config.clone())
            .with_store(store.clone())
            .with_audit_sink(audit.clone())
            .with_apple_provider(apple.clone())
            .with_firebase_provider(firebase.clone())
            .build()
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _workers = app.workers.spawn_all(shutdown_rx.clone());

        let app_router = fpp_server::api::app_router(&config.auth.instance_token, app.services);
        let mgmt_router =
            fpp_server::api::mgmt_router(MgmtState { health_service: app.health_service, metrics: app.metrics });

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router)
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });
        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self { api_url, mgmt_url, client: reqwest::Client::new(), store, audit, apple, firebase, shutdown_tx }
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.api_url))
            .header("Instance-Token", INSTANCE_TOKEN)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn register(&self, topic: &str, token: &str, kind: &str) -> reqwest::Response {
        self.post("/register", &serde_json::json!({ "token": token, "topic": topic, "type": kind })).await
    }

    pub async fn send(&self, topic: &str, kind: &str) -> reqwest::Response {
        self.post(
            "/send",
            &serde_json::json!({
                "call-id": "call-1",
                "uuid": "4d7f3a52-0c1e-4d8b-9a57-2b9f1c3e5a10",
                "topic": topic,
                "type": kind,
                "from-uri": "sip:alice@example.org",
                "display-name": "Alice",
            }),
        )
        .await
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.records()
    }

    pub async fn metrics_text(&self) -> String {
        self.client.get(format!("{}/metrics", self.mgmt_url)).send().await.unwrap().text().await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub async fn message(resp: reqwest::Response) -> String {
    let body: serde_json::Value = resp.json().await.unwrap();
    body["message"].as_str().unwrap().to_string()
}

/// Reads one sample from Prometheus text output.
pub fn sample(rendered: &str, name: &str) -> Option<f64> {
    rendered
        .lines()
        .find_map(|line| line.strip_prefix(name).and_then(|rest| rest.strip_prefix(' ')))
        .and_then(|value| value.trim().parse().ok())
}
