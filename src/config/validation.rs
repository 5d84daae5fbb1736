//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, threshold within 1..=100)
//! - Check that vendor base URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Provider selection and credentials are checked by the provider registry,
//!   which knows what each provider needs

use thiserror::Error;
use url::Url;

use crate::config::schema::DispatchConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.from_address.contains('@') {
        errors.push(ValidationError::new(
            "from_address",
            format!("'{}' is not an email address", config.from_address),
        ));
    }

    let breaker = &config.breaker;
    if breaker.timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.timeout_ms", "must be greater than 0"));
    }
    if breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.reset_timeout_ms", "must be greater than 0"));
    }
    if !(1..=100).contains(&breaker.error_threshold_percentage) {
        errors.push(ValidationError::new(
            "breaker.error_threshold_percentage",
            format!("{} is outside 1..=100", breaker.error_threshold_percentage),
        ));
    }
    if breaker.rolling_buckets == 0 {
        errors.push(ValidationError::new("breaker.rolling_buckets", "must be at least 1"));
    } else if breaker.rolling_window_ms == 0
        || breaker.rolling_window_ms % u64::from(breaker.rolling_buckets) != 0
    {
        errors.push(ValidationError::new(
            "breaker.rolling_window_ms",
            format!(
                "{} must be positive and divisible by rolling_buckets ({})",
                breaker.rolling_window_ms, breaker.rolling_buckets
            ),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if !(retry.factor.is_finite() && retry.factor >= 1.0) {
        errors.push(ValidationError::new(
            "retry.factor",
            format!("{} must be a finite number >= 1", retry.factor),
        ));
    }
    if let Some(max) = retry.max_timeout_ms {
        if max < retry.min_timeout_ms {
            errors.push(ValidationError::new(
                "retry.max_timeout_ms",
                format!("{} is below min_timeout_ms ({})", max, retry.min_timeout_ms),
            ));
        }
    }

    let provider = &config.provider;
    for (field, raw) in [
        ("provider.sendgrid.base_url", &provider.sendgrid.base_url),
        ("provider.mailgun.base_url", &provider.mailgun.base_url),
        ("provider.postmark.base_url", &provider.postmark.base_url),
    ] {
        if let Err(e) = Url::parse(raw) {
            errors.push(ValidationError::new(field, format!("'{}': {}", raw, e)));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("'{}' must be \"pretty\" or \"json\"", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&DispatchConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = DispatchConfig::default();
        config.from_address = "nobody".into();
        config.breaker.timeout_ms = 0;
        config.breaker.error_threshold_percentage = 150;
        config.retry.max_attempts = 0;
        config.retry.factor = 0.5;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            [
                "from_address",
                "breaker.timeout_ms",
                "breaker.error_threshold_percentage",
                "retry.max_attempts",
                "retry.factor",
            ]
        );
    }

    #[test]
    fn test_window_must_split_evenly() {
        let mut config = DispatchConfig::default();
        config.breaker.rolling_window_ms = 10_001;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "breaker.rolling_window_ms");
    }

    #[test]
    fn test_bad_base_url_reported() {
        let mut config = DispatchConfig::default();
        config.provider.mailgun.base_url = "not a url".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().starts_with("provider.mailgun.base_url"));
    }
}
