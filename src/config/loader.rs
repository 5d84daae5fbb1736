//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::DispatchConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and provider selection.
///
/// Every variant is fatal: the process must not start serving sends with it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The configured provider name has no registered constructor.
    #[error("Unsupported email service provider '{0}'")]
    UnsupportedProvider(String),

    /// The selected provider is missing a credential or setting it needs.
    #[error("Provider {provider} requires {setting}")]
    MissingSetting {
        provider: String,
        setting: &'static str,
    },

    /// The provider's HTTP client could not be initialised.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DispatchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: DispatchConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration from an optional file, then overlay process environment.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_with_env(path: Option<&Path>) -> Result<DispatchConfig, ConfigError> {
    load_layered(path, |key| std::env::var(key).ok())
}

/// Layered load with an injectable variable lookup.
pub fn load_layered<F>(path: Option<&Path>, lookup: F) -> Result<DispatchConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        Some(path) => {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            DispatchConfig::default()
        }
        None => DispatchConfig::default(),
    };

    let mut errors = apply_overrides(&mut config, lookup);
    if let Err(mut semantic) = validate_config(&config) {
        errors.append(&mut semantic);
    }
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}

/// Apply environment overrides, returning errors for values that fail to parse.
fn apply_overrides<F>(config: &mut DispatchConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("EMAIL_SERVICE_PROVIDER") {
        config.provider.name = v;
    }
    if let Some(v) = lookup("SENDGRID_API_KEY") {
        config.provider.sendgrid.api_key = Some(v);
    }
    if let Some(v) = lookup("MAILGUN_API_KEY") {
        config.provider.mailgun.api_key = Some(v);
    }
    if let Some(v) = lookup("MAILGUN_DOMAIN") {
        config.provider.mailgun.domain = Some(v);
    }
    if let Some(v) = lookup("POSTMARK_API_TOKEN") {
        config.provider.postmark.server_token = Some(v);
    }
    if let Some(v) = lookup("EMAIL_FROM_ADDRESS") {
        config.from_address = v;
    }

    parse_into(&lookup, "EMAIL_SERVICE_TIMEOUT_MS", &mut config.breaker.timeout_ms, &mut errors);
    parse_into(&lookup, "EMAIL_RETRY_ATTEMPTS", &mut config.retry.max_attempts, &mut errors);
    parse_into(&lookup, "EMAIL_RETRY_MIN_TIMEOUT_MS", &mut config.retry.min_timeout_ms, &mut errors);
    parse_into(
        &lookup,
        "EMAIL_CB_ERROR_THRESHOLD",
        &mut config.breaker.error_threshold_percentage,
        &mut errors,
    );
    parse_into(&lookup, "EMAIL_CB_RESET_TIMEOUT_MS", &mut config.breaker.reset_timeout_ms, &mut errors);

    errors
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T, errors: &mut Vec<ValidationError>)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => errors.push(ValidationError::new(key, format!("'{}' is not a valid number", raw))),
    }
}
