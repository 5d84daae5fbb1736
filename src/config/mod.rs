//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overlay (EMAIL_* variables)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated, immutable)
//!     → provider registry + dispatch service at startup
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::DispatchConfig;
pub use schema::{BreakerConfig, ObservabilityConfig, ProviderConfig, RetryConfig};
