//! Optional tenant records: owner membership and billing shell.

use std::sync::Arc;

use crate::domain::tenant::{Company, Customer, Membership, TenantBundle, UserProfile};
use crate::ports::{Clock, CustomerRepository, TenantRepository};

/// Creates the enrichment records of a tenant when they are missing.
///
/// Failures are logged and leave the record absent. A later run picks it up.
pub struct TenantEnricher {
    tenants: Arc<dyn TenantRepository>,
    customers: Arc<dyn CustomerRepository>,
    clock: Arc<dyn Clock>,
}

impl TenantEnricher {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        customers: Arc<dyn CustomerRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tenants,
            customers,
            clock,
        }
    }

    /// Fills in what is missing and returns the bundle as stored.
    pub async fn enrich(&self, company: Company, profile: UserProfile) -> TenantBundle {
        let membership = self.ensure_membership(&profile).await;
        let customer = self.ensure_customer(&company, &profile).await;
        TenantBundle {
            company,
            profile,
            membership,
            customer,
        }
    }

    async fn ensure_membership(&self, profile: &UserProfile) -> Option<Membership> {
        match self
            .tenants
            .find_membership(&profile.id, &profile.company_id)
            .await
        {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(user_id = %profile.id, error = %err, "membership lookup failed");
                return None;
            }
        }

        let membership = Membership::owner_of(profile, self.clock.now());
        match self.tenants.insert_membership(&membership).await {
            Ok(()) => Some(membership),
            Err(err) if err.is_unique_violation() => self
                .tenants
                .find_membership(&profile.id, &profile.company_id)
                .await
                .ok()
                .flatten(),
            Err(err) => {
                tracing::warn!(
                    user_id = %profile.id,
                    company_id = %profile.company_id,
                    error = %err,
                    "owner membership not created, left for repair"
                );
                None
            }
        }
    }

    async fn ensure_customer(&self, company: &Company, profile: &UserProfile) -> Option<Customer> {
        match self
            .customers
            .find_by_company(&company.id, &company.routing_key)
            .await
        {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(company_id = %company.id, error = %err, "customer lookup failed");
                return None;
            }
        }

        let customer = Customer::shell(
            company.id,
            company.routing_key.clone(),
            profile.email.clone(),
            self.clock.now(),
        );
        match self.customers.insert(&customer).await {
            Ok(()) => Some(customer),
            Err(err) if err.is_unique_violation() => self
                .customers
                .find_by_company(&company.id, &company.routing_key)
                .await
                .ok()
                .flatten(),
            Err(err) => {
                tracing::warn!(
                    company_id = %company.id,
                    error = %err,
                    "billing shell not created, left for repair"
                );
                None
            }
        }
    }
}
