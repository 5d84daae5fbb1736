//! Dispatch error types.

use thiserror::Error;
use uuid::Uuid;

use crate::provider::ProviderError;
use crate::resilience::{CallError, RetryExhausted};

/// Why a single attempt failed: breaker rejection, timeout, or provider error.
pub type AttemptError = CallError<ProviderError>;

/// Terminal failure of a logical send.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message was rejected before any provider call.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Every attempt failed.
    #[error("email send failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },
}

impl DispatchError {
    /// Cause of the final attempt, if any attempt was made.
    pub fn last_cause(&self) -> Option<&AttemptError> {
        match self {
            DispatchError::InvalidMessage(_) => None,
            DispatchError::RetryExhausted { last, .. } => Some(last),
        }
    }
}

impl From<RetryExhausted<AttemptError>> for DispatchError {
    fn from(e: RetryExhausted<AttemptError>) -> Self {
        DispatchError::RetryExhausted {
            attempts: e.attempts,
            last: e.last,
        }
    }
}

/// Proof of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub provider: &'static str,
    pub message_id: Uuid,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}
