//! Email dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! send_email(to, subject, html, text, attachments)
//!     → recipient check (InvalidMessage, nothing else touched)
//!     → EmailMessage (configured from-address, fresh message id)
//!     → metrics timer start
//!     → RetryPolicy
//!         → CircuitBreaker (per attempt)
//!             → ProviderAdapter::send
//!     → metrics timer stop + outcome counter
//!     → SendReceipt | DispatchError::RetryExhausted
//! ```
//!
//! # Design Decisions
//! - The service owns its breaker and metric handles; no global state
//! - Clones share one breaker, so every caller sees the same provider health
//! - Every failed attempt is logged with the message id; bodies never are

pub mod error;
pub mod service;

pub use error::{AttemptError, DispatchError, SendReceipt};
pub use service::EmailDispatchService;
