//! Provider registry.
//!
//! Maps provider identifiers to constructors. Adding a vendor means
//! registering one more entry; dispatch logic never branches on the name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::ProviderConfig;
use crate::config::ConfigError;
use crate::provider::{LogProvider, MailgunProvider, PostmarkProvider, ProviderAdapter, SendGridProvider};

/// Constructor for a provider adapter.
///
/// Receives the provider section of the config and the HTTP request timeout
/// the adapter should configure on its client.
pub type ProviderFactory = Box<
    dyn Fn(&ProviderConfig, Duration) -> Result<Arc<dyn ProviderAdapter>, ConfigError> + Send + Sync,
>;

/// Registry of known providers, keyed case-insensitively.
pub struct ProviderRegistry {
    factories: HashMap<String, (&'static str, ProviderFactory)>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in vendor adapter.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SendGridProvider::NAME, |config, timeout| {
            Ok(Arc::new(SendGridProvider::from_config(&config.sendgrid, timeout)?))
        });
        registry.register(MailgunProvider::NAME, |config, timeout| {
            Ok(Arc::new(MailgunProvider::from_config(&config.mailgun, timeout)?))
        });
        registry.register(PostmarkProvider::NAME, |config, timeout| {
            Ok(Arc::new(PostmarkProvider::from_config(&config.postmark, timeout)?))
        });
        registry.register(LogProvider::NAME, |_, _| Ok(Arc::new(LogProvider)));
        registry
    }

    /// Register (or replace) a provider constructor.
    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&ProviderConfig, Duration) -> Result<Arc<dyn ProviderAdapter>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), (name, Box::new(factory)));
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Build the adapter selected by `config.name`.
    pub fn build(
        &self,
        config: &ProviderConfig,
        request_timeout: Duration,
    ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
        let key = config.name.trim().to_ascii_lowercase();
        let Some((name, factory)) = self.factories.get(&key) else {
            tracing::error!(
                provider = %config.name,
                supported = ?self.names(),
                "Unsupported email service provider"
            );
            return Err(ConfigError::UnsupportedProvider(config.name.clone()));
        };

        let adapter = factory(config, request_timeout)?;
        tracing::info!(provider = name, "Email service provider selected");
        Ok(adapter)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
