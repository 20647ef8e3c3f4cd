use crate::domain::registration::{ProviderCounts, ProviderKind};
use metrics::{Counter, Gauge, Key, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const REGISTERED_APN_DEVICES: &str = "fpp_registered_apn_devices";
const REGISTERED_FIREBASE_DEVICES: &str = "fpp_registered_firebase_devices";
const TOTAL_SEND_COUNT: &str = "fpp_total_send_count";
const APN_SUCCESS_COUNT: &str = "fpp_apn_success_count";
const APN_ERROR_COUNT: &str = "fpp_apn_error_count";
const FIREBASE_SUCCESS_COUNT: &str = "fpp_firebase_success_count";
const FIREBASE_ERROR_COUNT: &str = "fpp_firebase_error_count";

/// Counters and gauges of the gateway, backed by a recorder owned by this struct
/// rather than the process-global one.
#[derive(Clone)]
pub struct PushMetrics {
    handle: PrometheusHandle,
    registered_apple: Gauge,
    registered_firebase: Gauge,
    total_sends: Counter,
    apple_success: Counter,
    apple_error: Counter,
    firebase_success: Counter,
    firebase_error: Counter,
}

impl std::fmt::Debug for PushMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushMetrics").finish_non_exhaustive()
    }
}

impl PushMetrics {
    #[must_use]
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

        let counter = |name: &'static str, help: &'static str| {
            recorder.describe_counter(name.into(), None, help.into());
            recorder.register_counter(&Key::from_static_name(name), &metadata)
        };
        let total_sends = counter(TOTAL_SEND_COUNT, "Number of sent notifications.");
        let apple_success = counter(APN_SUCCESS_COUNT, "Number of successful Apple APN notifications.");
        let apple_error = counter(APN_ERROR_COUNT, "Number of errored Apple APN notifications.");
        let firebase_success = counter(FIREBASE_SUCCESS_COUNT, "Number of successful Google Firebase notifications.");
        let firebase_error = counter(FIREBASE_ERROR_COUNT, "Number of errored Google Firebase notifications.");

        let gauge = |name: &'static str, help: &'static str| {
            recorder.describe_gauge(name.into(), None, help.into());
            recorder.register_gauge(&Key::from_static_name(name), &metadata)
        };
        let registered_apple = gauge(REGISTERED_APN_DEVICES, "Number of registered Apple APN devices.");
        let registered_firebase = gauge(REGISTERED_FIREBASE_DEVICES, "Number of registered Google Firebase devices.");

        Self {
            handle: recorder.handle(),
            registered_apple,
            registered_firebase,
            total_sends,
            apple_success,
            apple_error,
            firebase_success,
            firebase_error,
        }
    }

    /// Counts one send outcome. Unknown providers only move the total.
    pub fn record_send(&self, provider: Option<ProviderKind>, success: bool) {
        self.total_sends.increment(1);
        match (provider, success) {
            (Some(ProviderKind::Apple), true) => self.apple_success.increment(1),
            (Some(ProviderKind::Apple), false) => self.apple_error.increment(1),
            (Some(ProviderKind::Firebase), true) => self.firebase_success.increment(1),
            (Some(ProviderKind::Firebase), false) => self.firebase_error.increment(1),
            (None, _) => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn set_registered(&self, counts: ProviderCounts) {
        self.registered_apple.set(counts.apple as f64);
        self.registered_firebase.set(counts.firebase as f64);
    }

    /// Renders every metric in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for PushMetrics {
    fn default() -> Self {
        Self::new()
    }
}
