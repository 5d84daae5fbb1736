//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatcher.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the email dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Sender address stamped on every outbound message.
    pub from_address: String,

    /// Provider selection and credentials.
    pub provider: ProviderConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            from_address: "no-reply@example.com".to_string(),
            provider: ProviderConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Provider selection. Exactly one provider is active per process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Registered provider identifier (e.g., "SendGrid", "Mailgun").
    pub name: String,

    pub sendgrid: SendGridConfig,

    pub mailgun: MailgunConfig,

    pub postmark: PostmarkConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "SendGrid".to_string(),
            sendgrid: SendGridConfig::default(),
            mailgun: MailgunConfig::default(),
            postmark: PostmarkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SendGridConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.sendgrid.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailgunConfig {
    pub api_key: Option<String>,
    /// Sending domain registered with Mailgun.
    pub domain: Option<String>,
    /// API host; EU accounts use "https://api.eu.mailgun.net".
    pub base_url: String,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            domain: None,
            base_url: "https://api.mailgun.net".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostmarkConfig {
    pub server_token: Option<String>,
    pub base_url: String,
}

impl Default for PostmarkConfig {
    fn default() -> Self {
        Self {
            server_token: None,
            base_url: "https://api.postmarkapp.com".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Upper bound on a single provider call in milliseconds.
    pub timeout_ms: u64,

    /// Failure percentage (1-100) within the rolling window that opens the circuit.
    pub error_threshold_percentage: u32,

    /// How long the circuit stays open before a trial call, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Length of the rolling statistics window in milliseconds.
    pub rolling_window_ms: u64,

    /// Number of buckets the rolling window is divided into.
    pub rolling_buckets: u32,

    /// Minimum calls in the window before the error rate is evaluated.
    pub volume_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            error_threshold_percentage: 50,
            reset_timeout_ms: 30_000,
            rolling_window_ms: 10_000,
            rolling_buckets: 10,
            volume_threshold: 10,
        }
    }
}

impl BreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical send, including the first.
    pub max_attempts: u32,

    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,

    /// Delay before the second attempt in milliseconds.
    pub min_timeout_ms: u64,

    /// Optional cap on any single delay in milliseconds.
    pub max_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            factor: 2.0,
            min_timeout_ms: 1_000,
            max_timeout_ms: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = DispatchConfig::default();
        assert_eq!(config.provider.name, "SendGrid");
        assert_eq!(config.breaker.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.breaker.error_threshold_percentage, 50);
        assert_eq!(config.breaker.reset_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_timeout_ms, 1_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DispatchConfig = toml::from_str(
            r#"
            from_address = "billing@example.com"

            [provider]
            name = "Mailgun"

            [provider.mailgun]
            api_key = "key-123"
            domain = "mg.example.com"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.from_address, "billing@example.com");
        assert_eq!(config.provider.name, "Mailgun");
        assert_eq!(config.provider.mailgun.domain.as_deref(), Some("mg.example.com"));
        assert_eq!(config.provider.mailgun.base_url, "https://api.mailgun.net");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.factor, 2.0);
        assert_eq!(config.breaker.timeout_ms, 5_000);
    }
}
