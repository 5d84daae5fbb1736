//! Email dispatch façade.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::DispatchConfig;
use crate::dispatch::error::{DispatchError, SendReceipt};
use crate::mail::{Attachment, EmailMessage};
use crate::observability::metrics::{AttemptOutcome, MetricsRecorder, SendOutcome};
use crate::provider::ProviderAdapter;
use crate::resilience::{
    Attempted, BreakerObserver, BreakerSnapshot, CircuitBreaker, CircuitState, LogObserver, RetryPolicy,
};

/// Sends email through one provider with retry, circuit breaking and metrics.
///
/// Cloning is cheap; clones share the breaker and metric handles.
#[derive(Clone)]
pub struct EmailDispatchService {
    inner: Arc<Inner>,
}

struct Inner {
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    metrics: MetricsRecorder,
    from_address: String,
}

impl EmailDispatchService {
    /// Build a service with the logging and metrics breaker observers.
    ///
    /// Metric handles are resolved against the recorder current at this call.
    pub fn new(adapter: Arc<dyn ProviderAdapter>, config: &DispatchConfig) -> Self {
        Self::with_observers(adapter, config, Vec::new())
    }

    /// Like [`new`](Self::new), with extra observers notified after the built-in ones.
    pub fn with_observers(
        adapter: Arc<dyn ProviderAdapter>,
        config: &DispatchConfig,
        observers: Vec<Arc<dyn BreakerObserver>>,
    ) -> Self {
        let metrics = MetricsRecorder::new(adapter.name());
        let breaker = observers.into_iter().fold(
            CircuitBreaker::new(adapter.name(), &config.breaker)
                .with_observer(Arc::new(LogObserver))
                .with_observer(Arc::new(metrics.clone())),
            CircuitBreaker::with_observer,
        );

        Self {
            inner: Arc::new(Inner {
                adapter,
                breaker,
                retry: RetryPolicy::from_config(&config.retry),
                metrics,
                from_address: config.from_address.clone(),
            }),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.inner.adapter.name()
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.inner.breaker.snapshot()
    }

    /// Send one email.
    ///
    /// Runs up to `retry.max_attempts` attempts, each guarded by the circuit
    /// breaker and bounded by the breaker's call timeout.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendReceipt, DispatchError> {
        check_message(to, &attachments)?;

        let message = EmailMessage::new(
            self.inner.from_address.as_str(),
            to,
            subject,
            html,
            text,
            attachments,
        );
        let span = tracing::info_span!(
            "send_email",
            message_id = %message.id(),
            provider = self.provider()
        );
        self.dispatch(&message).instrument(span).await
    }

    async fn dispatch(&self, message: &EmailMessage) -> Result<SendReceipt, DispatchError> {
        let inner = &*self.inner;
        let provider = inner.adapter.name();
        let timer = inner.metrics.start_timer();

        let result = inner
            .retry
            .run(
                |_| async move {
                    let result = inner.breaker.call(|| inner.adapter.send(message)).await;
                    inner.metrics.record_attempt(AttemptOutcome::of(&result));
                    result
                },
                |attempt, error| {
                    tracing::warn!(
                        attempt,
                        max_attempts = inner.retry.max_attempts(),
                        provider,
                        message_id = %message.id(),
                        to = message.to(),
                        subject = message.subject(),
                        error = %error,
                        "Email send attempt failed"
                    );
                },
            )
            .await;

        match result {
            Ok(Attempted { attempts, .. }) => {
                timer.finish(SendOutcome::Success);
                if attempts > 1 {
                    tracing::info!(attempts, provider, "Email send recovered after retries");
                }
                tracing::info!(
                    provider,
                    message_id = %message.id(),
                    to = message.to(),
                    subject = message.subject(),
                    "Email sent successfully"
                );
                Ok(SendReceipt {
                    provider,
                    message_id: message.id(),
                    attempts,
                })
            }
            Err(exhausted) => {
                timer.finish(SendOutcome::Failure);
                tracing::error!(
                    provider,
                    message_id = %message.id(),
                    to = message.to(),
                    subject = message.subject(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last,
                    "Failed to send email after retries"
                );
                Err(exhausted.into())
            }
        }
    }
}

impl std::fmt::Debug for EmailDispatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailDispatchService")
            .field("provider", &self.provider())
            .field("breaker", &self.inner.breaker)
            .field("retry", &self.inner.retry)
            .field("from_address", &self.inner.from_address)
            .finish()
    }
}

/// Reject caller input errors before they reach the breaker.
fn check_message(to: &str, attachments: &[Attachment]) -> Result<(), DispatchError> {
    let to = to.trim();
    if to.is_empty() {
        return Err(DispatchError::InvalidMessage("recipient is empty".to_string()));
    }
    if !to.contains('@') {
        return Err(DispatchError::InvalidMessage(format!(
            "recipient '{to}' is not an email address"
        )));
    }
    attachments
        .iter()
        .try_for_each(Attachment::validate)
        .map_err(DispatchError::InvalidMessage)
}
