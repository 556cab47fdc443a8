//! Payment configuration

use serde::Deserialize;

use crate::domain::billing::PriceCatalog;
use crate::domain::tenant::PriceTier;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key. Empty outside production runs checkout against the
    /// mock provider.
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Stripe price ID per tier
    pub stripe_starter_price_id: Option<String>,
    pub stripe_growth_price_id: Option<String>,
    pub stripe_scale_price_id: Option<String>,

    /// Redirect after a completed checkout when the request names none
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Redirect after an abandoned checkout when the request names none
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    /// Reject test-mode webhook events
    #[serde(default)]
    pub require_livemode: bool,

    /// Timeout for Stripe API calls in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn is_configured(&self) -> bool {
        !self.stripe_api_key.is_empty()
    }

    /// Price ids by tier. Tiers without a price are left out.
    pub fn price_catalog(&self) -> PriceCatalog {
        [
            (PriceTier::Starter, &self.stripe_starter_price_id),
            (PriceTier::Growth, &self.stripe_growth_price_id),
            (PriceTier::Scale, &self.stripe_scale_price_id),
        ]
        .into_iter()
        .fold(PriceCatalog::new(), |catalog, (tier, price)| match price {
            Some(price_id) => catalog.with_price(tier, price_id.trim()),
            None => catalog,
        })
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if !self.is_configured() {
            if environment == Environment::Production {
                return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
            }
            return Ok(());
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if self.price_catalog() == PriceCatalog::new() {
            return Err(ValidationError::NoPricesConfigured);
        }
        if environment == Environment::Production {
            if !self.success_url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("PAYMENT__SUCCESS_URL"));
            }
            if !self.cancel_url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("PAYMENT__CANCEL_URL"));
            }
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_starter_price_id: None,
            stripe_growth_price_id: None,
            stripe_scale_price_id: None,
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            require_livemode: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_success_url() -> String {
    "http://localhost:5173/onboarding/complete".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:5173/onboarding/plans".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            stripe_growth_price_id: Some("price_growth".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = configured();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = PaymentConfig {
            stripe_api_key: "sk_live_xxx".to_string(),
            ..configured()
        };
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_validation_missing_webhook_secret() {
        let config = PaymentConfig {
            stripe_webhook_secret: String::new(),
            ..configured()
        };
        assert_eq!(
            config.validate(Environment::Development),
            Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_missing_api_key_only_allowed_outside_production() {
        let config = PaymentConfig {
            stripe_api_key: String::new(),
            ..configured()
        };
        assert!(config.validate(Environment::Development).is_ok());
        assert!(config.validate(Environment::Production).is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(), // Wrong prefix
            ..configured()
        };
        assert_eq!(
            config.validate(Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(), // Wrong prefix
            ..configured()
        };
        assert!(config.validate(Environment::Development).is_err());
    }

    #[test]
    fn test_at_least_one_price_required() {
        let config = PaymentConfig {
            stripe_growth_price_id: None,
            ..configured()
        };
        assert_eq!(
            config.validate(Environment::Development),
            Err(ValidationError::NoPricesConfigured)
        );
    }

    #[test]
    fn test_production_requires_https_redirects() {
        let config = configured();
        assert_eq!(
            config.validate(Environment::Production),
            Err(ValidationError::MustBeHttps("PAYMENT__SUCCESS_URL"))
        );
    }

    #[test]
    fn test_price_catalog_skips_unset_tiers() {
        let catalog = configured().price_catalog();
        assert_eq!(catalog.price_id(PriceTier::Growth), Some("price_growth"));
        assert_eq!(catalog.price_id(PriceTier::Starter), None);
        assert_eq!(catalog.tier_for_price("price_growth"), Some(PriceTier::Growth));
    }
}
