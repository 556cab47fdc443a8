//! Tenant module - the records the account provisioner creates.
//!
//! A verified signup becomes a company, a user profile bound to an external
//! identity, an owner membership and a billing customer.

mod company;
mod customer;
mod errors;
mod profile;

pub use company::{AccountNumber, Company};
pub use customer::{Customer, PaymentStatus, PriceTier, SubscriptionStatus};
pub use errors::ProvisioningError;
pub use profile::{Membership, MembershipRole, UserProfile};

use serde::{Deserialize, Serialize};

/// Everything provisioned for one verified signup.
///
/// `company` and `profile` are the core records. `membership` and `customer`
/// are enrichment: absent when their creation failed and the repair job has
/// not caught up yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantBundle {
    pub company: Company,
    pub profile: UserProfile,
    pub membership: Option<Membership>,
    pub customer: Option<Customer>,
}

impl TenantBundle {
    /// True when both enrichment records exist.
    pub fn is_complete(&self) -> bool {
        self.membership.is_some() && self.customer.is_some()
    }
}
