//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into a ready dispatch service
//! - Start the metrics endpoint when enabled
//!
//! # Design Decisions
//! - Fail fast: an unknown provider or missing credential is fatal
//! - The provider HTTP client timeout is twice the breaker timeout, so the
//!   breaker's deadline is the one that fires

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, DispatchConfig};
use crate::dispatch::EmailDispatchService;
use crate::observability::metrics::serve_metrics;
use crate::provider::{ProviderAdapter, ProviderRegistry};

/// HTTP client timeout for provider adapters.
pub fn provider_request_timeout(config: &DispatchConfig) -> Duration {
    config.breaker.call_timeout().saturating_mul(2)
}

/// Build the configured provider adapter.
pub fn build_provider(
    config: &DispatchConfig,
    registry: &ProviderRegistry,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    registry.build(&config.provider, provider_request_timeout(config))
}

/// Build the dispatch service for the configured provider.
pub fn build_service(
    config: &DispatchConfig,
    registry: &ProviderRegistry,
) -> Result<EmailDispatchService, ConfigError> {
    let adapter = build_provider(config, registry)?;
    let service = EmailDispatchService::new(adapter, config);

    tracing::info!(
        provider = service.provider(),
        from = %config.from_address,
        timeout_ms = config.breaker.timeout_ms,
        error_threshold = config.breaker.error_threshold_percentage,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        max_attempts = config.retry.max_attempts,
        "Email dispatch service ready"
    );
    Ok(service)
}

/// Build the service, then serve `/metrics` if a handle is given.
///
/// Nothing listens unless the provider could be built.
pub async fn start_service(
    config: &DispatchConfig,
    registry: &ProviderRegistry,
    metrics: Option<PrometheusHandle>,
) -> Result<(EmailDispatchService, Option<JoinHandle<()>>), ConfigError> {
    let service = build_service(config, registry)?;
    let server = match metrics {
        Some(handle) => Some(spawn_metrics_server(config, handle).await?),
        None => None,
    };
    Ok((service, server))
}

/// Bind the metrics address and serve `/metrics` in the background.
pub async fn spawn_metrics_server(
    config: &DispatchConfig,
    handle: PrometheusHandle,
) -> std::io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(&config.observability.metrics_address).await?;
    Ok(tokio::spawn(async move {
        if let Err(e) = serve_metrics(listener, handle).await {
            tracing::error!(error = %e, "Metrics endpoint stopped");
        }
    }))
}
