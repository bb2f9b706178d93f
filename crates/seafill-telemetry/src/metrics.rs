//! Prometheus metrics for seafill.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric
//! names, a startup-time configuration error, and only happens during
//! static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Transactions accepted by the node.
/// Labels: step (channel/shared_proxy/deposit/approve/fulfill)
pub static SUBMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "seafill_submissions_total",
        "Transactions accepted by the node",
        &["step"]
    )
    .unwrap()
});

/// Submissions rejected by the node before mining.
pub static SUBMISSION_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "seafill_submission_errors_total",
        "Submissions rejected by the node",
        &["step", "kind"]
    )
    .unwrap()
});

/// Mined transactions that reverted.
/// Labels: step, reason (protocol error name or "unknown")
pub static REVERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "seafill_reverts_total",
        "Mined transactions that reverted",
        &["step", "reason"]
    )
    .unwrap()
});

/// Time from submission to receipt.
pub static CONFIRMATION_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "seafill_confirmation_latency_ms",
        "Time from submission to receipt in milliseconds",
        &["step"],
        vec![
            100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0, 60000.0, 120000.0
        ]
    )
    .unwrap()
});

/// Submissions waiting for a receipt, across all sessions.
pub static PENDING_SUBMISSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "seafill_pending_submissions",
        "Submissions waiting for a receipt"
    )
    .unwrap()
});

/// Fulfillment attempts by outcome (filled/reverted/unknown).
pub static FULFILLMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "seafill_fulfillments_total",
        "Fulfillment attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a transaction accepted by the node.
    pub fn submission(step: &str) {
        SUBMISSIONS_TOTAL.with_label_values(&[step]).inc();
        PENDING_SUBMISSIONS.inc();
    }

    /// Record a submission the node refused.
    pub fn submission_error(step: &str, kind: &str) {
        SUBMISSION_ERRORS_TOTAL.with_label_values(&[step, kind]).inc();
    }

    /// Record a receipt, successful or not.
    pub fn confirmed(step: &str, latency_ms: f64) {
        CONFIRMATION_LATENCY_MS
            .with_label_values(&[step])
            .observe(latency_ms);
        PENDING_SUBMISSIONS.dec();
    }

    /// Record a mined revert.
    pub fn reverted(step: &str, reason: &str) {
        REVERTS_TOTAL.with_label_values(&[step, reason]).inc();
    }

    /// Record a fulfillment outcome.
    pub fn fulfillment(outcome: &str) {
        FULFILLMENTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
