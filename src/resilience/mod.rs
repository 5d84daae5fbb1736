//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical send:
//!     → retries.rs (attempt loop, backoff between attempts)
//!         → circuit_breaker.rs (admit or reject, track outcomes per window)
//!             → timeouts.rs (bound the provider call)
//!                 → provider adapter
//! ```
//!
//! # Design Decisions
//! - Every provider call has a deadline; a timeout is a failure
//! - The breaker wraps each attempt, the retry policy wraps the breaker
//! - Backoff is deterministic (no jitter)
//! - Nothing here knows about email; the dispatch service composes the parts

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerObserver, BreakerSnapshot, CallError, CircuitBreaker, CircuitState, LogObserver, Transition,
};
pub use retries::{Attempted, RetryExhausted, RetryPolicy};
