//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Init logging/metrics → Build provider → Build service
//!     → Serve /metrics
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then the provider
//! - Any startup error is fatal; nothing is sent with a half-built service

pub mod startup;

pub use startup::{build_provider, build_service, spawn_metrics_server, start_service};
