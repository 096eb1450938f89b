//! Prometheus metrics and structured logging for storelink.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Request outcome counters for the HTTP transport
//! - Connection registry counters and gauges

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{Metrics, RequestOutcome};
