//! Prometheus Metrics Module
//!
//! Exposes stream metrics in Prometheus format.
//!
//! # Metrics
//!
//! - `sensor_stream_readings_emitted_total`: readings delivered to clients
//! - `sensor_stream_subscriptions_total`: streaming calls accepted
//! - `sensor_stream_active_subscriptions`: currently open streams
//! - `sensor_stream_streams_aborted_total`: streams ended by an emitter error
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Panics
///
/// Panics if another global recorder was installed first.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

const READINGS_EMITTED: &str = "sensor_stream_readings_emitted_total";
const SUBSCRIPTIONS_TOTAL: &str = "sensor_stream_subscriptions_total";
const ACTIVE_SUBSCRIPTIONS: &str = "sensor_stream_active_subscriptions";
const STREAMS_ABORTED: &str = "sensor_stream_streams_aborted_total";

fn register_metrics() {
    describe_counter!(READINGS_EMITTED, "Total readings sent to gRPC clients");
    describe_counter!(SUBSCRIPTIONS_TOTAL, "Total reading streams opened");
    describe_gauge!(ACTIVE_SUBSCRIPTIONS, "Number of open reading streams");
    describe_counter!(
        STREAMS_ABORTED,
        "Total reading streams terminated by an emitter error"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Reason label for aborted streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The service is shutting down.
    Shutdown,
    /// The tick counter ran out.
    TickOverflow,
}

impl AbortReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::TickOverflow => "tick_overflow",
        }
    }
}

/// Record one reading sent to a client.
pub fn record_reading_emitted() {
    counter!(READINGS_EMITTED).increment(1);
}

/// Record a new streaming subscription.
pub fn record_subscription_opened() {
    counter!(SUBSCRIPTIONS_TOTAL).increment(1);
    gauge!(ACTIVE_SUBSCRIPTIONS).increment(1.0);
}

/// Record a streaming subscription ending.
pub fn record_subscription_closed() {
    gauge!(ACTIVE_SUBSCRIPTIONS).decrement(1.0);
}

/// Record a stream terminated by an emitter error.
pub fn record_stream_aborted(reason: AbortReason) {
    counter!(STREAMS_ABORTED, "reason" => reason.as_str()).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
