//! RepairTenantsHandler - completes tenants whose enrichment failed.
//!
//! Each pass examines one page and hands back a cursor, so profiles that
//! cannot be repaired do not keep the rest from being reached.

use std::sync::Arc;

use crate::domain::tenant::ProvisioningError;
use crate::ports::{ProfileCursor, TenantRepository};

use super::enrichment::TenantEnricher;

#[derive(Debug, Clone)]
pub struct RepairTenantsCommand {
    /// Maximum number of profiles examined in one pass.
    pub limit: u32,
    /// Resume after this profile. `None` starts from the oldest.
    pub after: Option<ProfileCursor>,
}

impl Default for RepairTenantsCommand {
    fn default() -> Self {
        Self {
            limit: 100,
            after: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairTenantsResult {
    pub examined: usize,
    pub repaired: usize,
    pub still_incomplete: usize,
    /// Where the next pass resumes. `None` once the last page was read.
    pub next: Option<ProfileCursor>,
}

/// Handler for the repair pass over incomplete tenants.
pub struct RepairTenantsHandler {
    tenants: Arc<dyn TenantRepository>,
    enricher: Arc<TenantEnricher>,
}

impl RepairTenantsHandler {
    pub fn new(tenants: Arc<dyn TenantRepository>, enricher: Arc<TenantEnricher>) -> Self {
        Self { tenants, enricher }
    }

    pub async fn handle(
        &self,
        cmd: RepairTenantsCommand,
    ) -> Result<RepairTenantsResult, ProvisioningError> {
        let profiles = self
            .tenants
            .list_incomplete_profiles(cmd.after.as_ref(), cmd.limit)
            .await?;
        let full_page = cmd.limit > 0 && profiles.len() >= cmd.limit as usize;
        let mut result = RepairTenantsResult {
            examined: profiles.len(),
            next: profiles
                .last()
                .filter(|_| full_page)
                .map(ProfileCursor::from),
            ..Default::default()
        };

        for profile in profiles {
            let company = match self.tenants.find_company(&profile.company_id).await {
                Ok(Some(company)) => company,
                Ok(None) => {
                    tracing::warn!(
                        user_id = %profile.id,
                        company_id = %profile.company_id,
                        "profile without company, skipped"
                    );
                    result.still_incomplete += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(user_id = %profile.id, error = %err, "company lookup failed");
                    result.still_incomplete += 1;
                    continue;
                }
            };

            if self.enricher.enrich(company, profile).await.is_complete() {
                result.repaired += 1;
            } else {
                result.still_incomplete += 1;
            }
        }

        tracing::info!(
            examined = result.examined,
            repaired = result.repaired,
            still_incomplete = result.still_incomplete,
            more = result.next.is_some(),
            "tenant repair pass finished"
        );
        Ok(result)
    }
}
