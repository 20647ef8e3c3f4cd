use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

/// Upper bound for `--ttl-days`, about ten years.
pub const MAX_TTL_DAYS: i64 = 3650;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub registry: RegistryConfig,

    #[command(flatten)]
    pub apple: ApnsConfig,

    #[command(flatten)]
    pub firebase: FcmConfig,

    #[command(flatten)]
    pub audit: AuditConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "FPP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the public API (register, deregister, send)
    #[arg(long, env = "FPP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port of the management API (livez, readyz, metrics)
    #[arg(long, env = "FPP_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// How long to wait for background tasks on shutdown
    #[arg(long, env = "FPP_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Shared secret expected in the Instance-Token header of register/deregister calls
    #[arg(long, env = "FPP_INSTANCE_TOKEN", hide_env_values = true)]
    pub instance_token: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Durable storage in Valkey/Redis
    #[default]
    Valkey,
    /// In-process map, lost on restart
    Memory,
}

#[derive(Clone, Debug, Args)]
pub struct RegistryConfig {
    /// Where topic registrations are stored
    #[arg(long, env = "FPP_REGISTRY_BACKEND", value_enum, default_value_t = StorageBackend::Valkey)]
    pub backend: StorageBackend,

    /// Valkey connection URL
    #[arg(long, env = "FPP_VALKEY_URL", default_value = "redis://127.0.0.1:6379")]
    pub valkey_url: String,

    /// Prefix for registry keys in Valkey
    #[arg(long, env = "FPP_REGISTRY_KEY_PREFIX", default_value = "fpp:topic:")]
    pub key_prefix: String,

    /// Time-to-live of a registration in days, refreshed on every successful send
    #[arg(
        long,
        env = "FPP_REGISTRY_TTL_DAYS",
        default_value_t = 180,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_DAYS)
    )]
    pub ttl_days: i64,

    /// How often expired registrations are compacted
    #[arg(long, env = "FPP_REGISTRY_COMPACTION_INTERVAL_SECS", default_value_t = 60)]
    pub compaction_interval_secs: u64,

    /// How often the registered-device gauges are recounted
    #[arg(long, env = "FPP_REGISTRY_RESYNC_INTERVAL_SECS", default_value_t = 300)]
    pub resync_interval_secs: u64,

    /// Initial backoff between Valkey connection attempts
    #[arg(long, env = "FPP_VALKEY_CONNECT_MIN_BACKOFF_MS", default_value_t = 200)]
    pub connect_min_backoff_ms: u64,

    /// Maximum backoff between Valkey connection attempts
    #[arg(long, env = "FPP_VALKEY_CONNECT_MAX_BACKOFF_SECS", default_value_t = 10)]
    pub connect_max_backoff_secs: u64,

    /// Connection attempts before giving up at boot
    #[arg(long, env = "FPP_VALKEY_CONNECT_MAX_RETRIES", default_value_t = 5)]
    pub connect_max_retries: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ApnsEnvironment {
    Sandbox,
    Production,
}

impl ApnsEnvironment {
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Sandbox => "https://api.sandbox.push.apple.com",
            Self::Production => "https://api.push.apple.com",
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ApnsConfig {
    /// Path to the APNs .p8 signing key
    #[arg(long, env = "FPP_APPLE_CREDENTIALS")]
    pub apple_credentials: PathBuf,

    /// Key ID of the APNs signing key
    #[arg(long, env = "FPP_APPLE_KEY_ID")]
    pub apple_key_id: String,

    /// Apple developer team ID
    #[arg(long, env = "FPP_APPLE_TEAM_ID")]
    pub apple_team_id: String,

    /// APNs topic (the app bundle ID, usually suffixed with .voip)
    #[arg(long, env = "FPP_APPLE_TOPIC")]
    pub apple_topic: String,

    /// APNs environment
    #[arg(long, env = "FPP_APPLE_ENVIRONMENT", value_enum)]
    pub apple_environment: ApnsEnvironment,

    /// Overrides the APNs base URL derived from the environment
    #[arg(long, env = "FPP_APPLE_ENDPOINT")]
    pub apple_endpoint: Option<String>,

    /// Request timeout for APNs calls
    #[arg(long, env = "FPP_APPLE_TIMEOUT_SECS", default_value_t = 10)]
    pub apple_timeout_secs: u64,
}

impl ApnsConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.apple_endpoint.as_deref().unwrap_or_else(|| self.apple_environment.endpoint())
    }
}

#[derive(Clone, Debug, Args)]
pub struct FcmConfig {
    /// Path to the Google service account JSON file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub firebase_credentials: PathBuf,

    /// Firebase project ID; defaults to the one in the service account file
    #[arg(long, env = "FPP_FIREBASE_PROJECT_ID")]
    pub firebase_project_id: Option<String>,

    /// FCM base URL
    #[arg(long, env = "FPP_FIREBASE_ENDPOINT", default_value = "https://fcm.googleapis.com")]
    pub firebase_endpoint: String,

    /// Request timeout for FCM and OAuth calls
    #[arg(long, env = "FPP_FIREBASE_TIMEOUT_SECS", default_value_t = 10)]
    pub firebase_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuditConfig {
    /// Append audit records to this file instead of stdout
    #[arg(long = "audit-path", env = "FPP_AUDIT_PATH")]
    pub path: Option<PathBuf>,

    /// Records buffered before new ones are dropped
    #[arg(long = "audit-channel-capacity", env = "FPP_AUDIT_CHANNEL_CAPACITY", default_value_t = 1024)]
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { path: None, channel_capacity: 1024 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// How long the readiness probe waits for the registry store
    #[arg(long, env = "FPP_HEALTH_REGISTRY_TIMEOUT_MS", default_value_t = 2000)]
    pub registry_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { registry_timeout_ms: 2000 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "FPP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP HTTP endpoint for trace export (disabled when unset)
    #[arg(long, env = "FPP_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
