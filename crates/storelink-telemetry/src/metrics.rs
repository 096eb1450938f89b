//! Prometheus metrics for storelink.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

/// HTTP requests by operation and outcome.
/// Labels: op (get/post/post_file/file), outcome (success/server/network)
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "storelink_http_requests_total",
        "Total datastore HTTP requests by outcome",
        &["op", "outcome"]
    )
    .unwrap()
});

/// New WebSocket connections created by the registry.
pub static WS_OPEN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "storelink_ws_open_total",
        "WebSocket connections created by the registry"
    )
    .unwrap()
});

/// Opens answered with an existing OPEN connection.
pub static WS_REUSE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "storelink_ws_reuse_total",
        "Registry opens that reused an OPEN connection"
    )
    .unwrap()
});

/// Registry sends that transmitted nothing.
/// Labels: reason (not_connected/send_failed/serialize)
pub static WS_SEND_REJECTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "storelink_ws_send_rejected_total",
        "Registry sends rejected without transmitting",
        &["reason"]
    )
    .unwrap()
});

/// Channels held, summed over every live connection registry.
///
/// Registries report deltas, so several registries in one process add up
/// instead of overwriting each other.
pub static WS_REGISTRY_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "storelink_ws_registry_size",
        "Channels currently held across all connection registries"
    )
    .unwrap()
});

/// Classified result of one HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Server,
    Network,
}

impl RequestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Server => "server",
            Self::Network => "network",
        }
    }
}

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a finished HTTP request.
    pub fn http_request(op: &str, outcome: RequestOutcome) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[op, outcome.as_str()])
            .inc();
    }

    /// Record a fresh registry connection.
    pub fn ws_opened() {
        WS_OPEN_TOTAL.inc();
    }

    /// Record an open that returned the existing connection.
    pub fn ws_reused() {
        WS_REUSE_TOTAL.inc();
    }

    /// Record a rejected registry send.
    pub fn ws_send_rejected(reason: &str) {
        WS_SEND_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Adjust the registry size gauge by `delta` entries.
    pub fn ws_registry_changed(delta: i64) {
        WS_REGISTRY_SIZE.add(delta);
    }

    /// Current value of the registry size gauge.
    pub fn ws_registry_size() -> i64 {
        WS_REGISTRY_SIZE.get()
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
