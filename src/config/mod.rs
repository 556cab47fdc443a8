//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `ONBOARDING` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use onboarding_pipeline::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod identity;
mod messaging;
mod payment;
mod provisioning;
mod server;
mod signup;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use identity::IdentityConfig;
pub use messaging::MessagingConfig;
pub use payment::PaymentConfig;
pub use provisioning::ProvisioningConfig;
pub use server::{Environment, ServerConfig};
pub use signup::SignupConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment configuration (Stripe)
    pub payment: PaymentConfig,

    /// Verification code delivery (Twilio, Resend)
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Identity provider (Zitadel)
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Verification limits
    #[serde(default)]
    pub signup: SignupConfig,

    /// Provisioning timeouts and repair job
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `ONBOARDING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ONBOARDING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ONBOARDING__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ONBOARDING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production requires every external provider to be configured; other
    /// environments fall back to in-memory adapters for anything left unset.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = self.server.environment;
        self.server.validate()?;
        self.database.validate(environment)?;
        self.payment.validate(environment)?;
        self.messaging.validate(environment)?;
        self.identity.validate(environment)?;
        self.signup.validate()?;
        self.provisioning.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
