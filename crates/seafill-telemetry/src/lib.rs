//! Prometheus metrics and structured logging for seafill.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters and histograms for submissions, reverts,
//!   confirmation latency and fulfillment outcomes

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
