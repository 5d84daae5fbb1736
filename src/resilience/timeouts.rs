//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap provider calls with a deadline
//! - Report a timeout distinctly from the operation's own error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - On expiry the operation future is dropped; the vendor may still finish
//!   the request, but its result is discarded

use std::future::Future;
use std::time::Duration;

use crate::resilience::circuit_breaker::CallError;

/// Run `fut` with an upper bound of `limit`.
pub async fn bounded<T, E, F>(limit: Duration, fut: F) -> Result<T, CallError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(_) => Err(CallError::Timeout(limit)),
    }
}
