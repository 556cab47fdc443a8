//! Account provisioning configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    /// Upper bound for each external step (identity, storage) in seconds
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Seconds between repair runs for incomplete tenants; 0 disables
    #[serde(default = "default_repair_interval")]
    pub repair_interval_secs: u64,

    /// Profiles examined per repair run
    #[serde(default = "default_repair_batch")]
    pub repair_batch_size: u32,
}

impl ProvisioningConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// `None` when the repair job is disabled.
    pub fn repair_interval(&self) -> Option<Duration> {
        (self.repair_interval_secs > 0).then(|| Duration::from_secs(self.repair_interval_secs))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step_timeout_secs == 0 || self.step_timeout_secs > 120 {
            return Err(ValidationError::InvalidProvisioning("step_timeout_secs"));
        }
        if self.repair_batch_size == 0 {
            return Err(ValidationError::InvalidProvisioning("repair_batch_size"));
        }
        Ok(())
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
            repair_interval_secs: default_repair_interval(),
            repair_batch_size: default_repair_batch(),
        }
    }
}

fn default_step_timeout() -> u64 {
    10
}

fn default_repair_interval() -> u64 {
    300
}

fn default_repair_batch() -> u32 {
    100
}
