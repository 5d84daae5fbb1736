//! Provider that only logs. For local development.

use async_trait::async_trait;

use crate::mail::EmailMessage;
use crate::provider::{ProviderAdapter, ProviderError};

/// Accepts every message and records it in the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProvider;

impl LogProvider {
    pub const NAME: &'static str = "Log";
}

#[async_trait]
impl ProviderAdapter for LogProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        tracing::info!(
            provider = Self::NAME,
            message_id = %message.id(),
            to = %message.to(),
            from = %message.from(),
            subject = %message.subject(),
            attachments = message.attachments().len(),
            "Email accepted by log provider (not delivered)"
        );
        Ok(())
    }
}
