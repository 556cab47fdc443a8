//! Identity provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Zitadel user management configuration
///
/// Unset outside production creates identities in memory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Zitadel instance URL
    #[serde(default)]
    pub zitadel_authority: String,

    /// Personal access token of the provisioning service user
    #[serde(default)]
    pub zitadel_service_token: String,

    /// Organization new users are created in
    #[serde(default)]
    pub zitadel_organization_id: String,

    /// Timeout for Zitadel calls in seconds
    pub request_timeout_secs: Option<u64>,
}

impl IdentityConfig {
    pub fn is_configured(&self) -> bool {
        !self.zitadel_authority.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(10))
    }

    /// Validate identity configuration
    ///
    /// In production, requires HTTPS for the authority URL.
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if !self.is_configured() {
            if environment == Environment::Production {
                return Err(ValidationError::MissingRequired("ZITADEL_AUTHORITY"));
            }
            return Ok(());
        }
        if self.zitadel_service_token.is_empty() {
            return Err(ValidationError::MissingRequired("ZITADEL_SERVICE_TOKEN"));
        }
        if self.zitadel_organization_id.is_empty() {
            return Err(ValidationError::MissingRequired("ZITADEL_ORGANIZATION_ID"));
        }
        if environment == Environment::Production
            && !self.zitadel_authority.starts_with("https://")
        {
            return Err(ValidationError::MustBeHttps("ZITADEL_AUTHORITY"));
        }
        Ok(())
    }
}
