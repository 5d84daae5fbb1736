//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch service and breaker produce:
//!     → logging.rs (structured log events, correlated by message id)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Message id flows through every log line of a send
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::{init_metrics, metrics_router, serve_metrics, MetricsRecorder};
