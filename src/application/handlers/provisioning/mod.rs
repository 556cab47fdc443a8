//! Provisioning handlers.
//!
//! ## Commands
//! - Provisioning a tenant from a verified signup
//! - Repairing tenants whose membership or billing shell is missing

mod enrichment;
mod provision_account;
mod repair_tenants;

pub use enrichment::TenantEnricher;
pub use provision_account::{
    ProvisionAccountCommand, ProvisionAccountHandler, ProvisionAccountResult,
};
pub use repair_tenants::{RepairTenantsCommand, RepairTenantsHandler, RepairTenantsResult};
