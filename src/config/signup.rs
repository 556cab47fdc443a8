//! Signup verification limits

use serde::Deserialize;

use crate::domain::signup::SignupPolicy;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupConfig {
    /// Minutes a verification code stays valid
    #[serde(default = "default_code_ttl")]
    pub code_ttl_minutes: i64,

    /// Wrong codes allowed before the request locks
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Extra codes that may be sent for one request
    #[serde(default = "default_max_resends")]
    pub max_resends: u32,
}

impl SignupConfig {
    pub fn policy(&self) -> SignupPolicy {
        SignupPolicy {
            code_ttl_minutes: self.code_ttl_minutes,
            max_attempts: self.max_attempts,
            max_resends: self.max_resends,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code_ttl_minutes <= 0 || self.code_ttl_minutes > 24 * 60 {
            return Err(ValidationError::InvalidSignupLimit("code_ttl_minutes"));
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidSignupLimit("max_attempts"));
        }
        Ok(())
    }
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: default_code_ttl(),
            max_attempts: default_max_attempts(),
            max_resends: default_max_resends(),
        }
    }
}

fn default_code_ttl() -> i64 {
    15
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_resends() -> u32 {
    3
}
