//! Prometheus metrics for the relay.
//!
//! All metrics follow the naming convention: `relay_<metric>_<unit>`.
//! Label values are decimal domain ids.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SCANNER
    // =========================================================================

    /// Messages read from outbound logs
    pub static ref MESSAGES_SCANNED: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_messages_scanned_total", "Dispatched messages read from outbound logs"),
        &["origin"]
    ).expect("metric creation failed");

    /// Failed outbound log reads
    pub static ref SCAN_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_scan_failures_total", "Outbound log reads that failed"),
        &["origin"]
    ).expect("metric creation failed");

    /// Dispatch events skipped because they could not be decoded
    pub static ref MALFORMED_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_malformed_events_total", "Dispatch events skipped as undecodable"),
        &["origin"]
    ).expect("metric creation failed");

    /// Next log position each origin will read from
    pub static ref CHECKPOINT_POSITION: IntGaugeVec = IntGaugeVec::new(
        Opts::new("relay_checkpoint_position", "Next outbound log position to scan"),
        &["origin"]
    ).expect("metric creation failed");

    // =========================================================================
    // SUBMITTER
    // =========================================================================

    /// Settled deliveries
    pub static ref DELIVERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_deliveries_total", "Messages settled on their destination"),
        &["destination", "outcome"]  // outcome: delivered/already_delivered
    ).expect("metric creation failed");

    /// Failed deliveries
    pub static ref DELIVERY_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_delivery_failures_total", "Delivery attempts that failed"),
        &["destination", "kind"]  // kind: rejected/unavailable/unconfirmed
    ).expect("metric creation failed");

    // =========================================================================
    // WAITERS
    // =========================================================================

    /// Delivery waits that ran out of time
    pub static ref WAIT_TIMEOUTS: IntCounter = IntCounter::new(
        "relay_wait_timeouts_total",
        "Delivery waits that timed out before every receipt arrived"
    ).expect("metric creation failed");
}

/// Handle to the metrics registry.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Registry the relay metrics are registered in.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register all relay metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Scanner
        Box::new(MESSAGES_SCANNED.clone()),
        Box::new(SCAN_FAILURES.clone()),
        Box::new(MALFORMED_EVENTS.clone()),
        Box::new(CHECKPOINT_POSITION.clone()),
        // Submitter
        Box::new(DELIVERIES.clone()),
        Box::new(DELIVERY_FAILURES.clone()),
        // Waiters
        Box::new(WAIT_TIMEOUTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
