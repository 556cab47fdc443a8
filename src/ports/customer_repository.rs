//! Customer repository port - local billing records.

use crate::domain::foundation::{CompanyId, DomainError, RoutingKey};
use crate::domain::tenant::Customer;
use async_trait::async_trait;

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
        routing_key: &RoutingKey,
    ) -> Result<Option<Customer>, DomainError>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<Customer>, DomainError>;

    /// # Errors
    ///
    /// - `UniqueViolation` if the company/routing key pair or the processor
    ///   customer id already has a record
    async fn insert(&self, customer: &Customer) -> Result<(), DomainError>;

    /// Conditional on `customer.version`, stores `version + 1`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the stored version differs
    async fn update(&self, customer: &Customer) -> Result<(), DomainError>;
}
