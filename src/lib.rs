//! Resilient email dispatch library.
//!
//! Sends transactional email through a pluggable vendor adapter, guarded by a
//! circuit breaker and a bounded retry policy, with Prometheus metrics.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod mail;
pub mod provider;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::DispatchConfig;
pub use dispatch::{DispatchError, EmailDispatchService, SendReceipt};
pub use mail::{Attachment, EmailMessage};
pub use provider::{ProviderAdapter, ProviderError, ProviderRegistry};
