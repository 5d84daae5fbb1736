//! Provider adapter subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchConfig.provider.name
//!     → registry.rs (look up constructor, fail fast on unknown name)
//!     → Arc<dyn ProviderAdapter> (one per process)
//!
//! EmailMessage
//!     → adapter (sendgrid.rs / mailgun.rs / postmark.rs / logger.rs)
//!     → vendor HTTP API
//! ```
//!
//! # Design Decisions
//! - Adapters only translate and transmit; timeouts, retries and circuit
//!   breaking live in the resilience subsystem
//! - Vendor failures are wrapped, never swallowed
//! - Non-2xx responses carry status and a truncated body for diagnosis

pub mod logger;
pub mod mailgun;
pub mod postmark;
pub mod registry;
pub mod sendgrid;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::validation::ValidationError;
use crate::config::ConfigError;
use crate::mail::EmailMessage;

pub use logger::LogProvider;
pub use mailgun::MailgunProvider;
pub use postmark::PostmarkProvider;
pub use registry::{ProviderFactory, ProviderRegistry};
pub use sendgrid::SendGridProvider;

/// Longest vendor response body kept in a [`ProviderError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Errors returned by a vendor email API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS, or request construction failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor answered with a non-success status.
    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The vendor could not be used for another reason.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Uniform "send a message" capability over a vendor email API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Hand one message to the vendor.
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError>;
}

/// Resolve `path` under `base_url`, keeping any path prefix the base carries
/// (`https://relay.internal/sendgrid` + `v3/mail/send`).
pub(crate) fn endpoint(base_url: &str, path: &str, field: &str) -> Result<Url, ConfigError> {
    let invalid = |e: url::ParseError| ConfigError::Validation(vec![ValidationError::new(field, e.to_string())]);

    let mut base = Url::parse(base_url).map_err(invalid)?;
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }
    base.join(path.trim_start_matches('/')).map_err(invalid)
}

/// Map a vendor response onto `Ok(())` or [`ProviderError::Rejected`].
pub(crate) async fn check_response(response: reqwest::Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(ProviderError::Rejected {
        status: status.as_u16(),
        body,
    })
}
