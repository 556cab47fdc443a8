//! Tenant repository port.
//!
//! Stores the records the account provisioner creates: companies, user
//! profiles and memberships, plus the account number sequence.
//!
//! # Design
//!
//! - **Natural keys**: unique constraints on `companies.signup_request_id`,
//!   `user_profiles.id`, `user_profiles.signup_request_id` and
//!   `memberships (user_id, company_id)` turn duplicate provisioning into
//!   `UniqueViolation` instead of duplicate rows
//! - **Sequence per routing key**: account numbers never come from clients

use crate::domain::foundation::{
    CompanyId, DomainError, RoutingKey, SignupRequestId, Timestamp, UserId,
};
use crate::domain::tenant::{AccountNumber, Company, Membership, UserProfile};
use async_trait::async_trait;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Next account number for the routing key. Never repeats.
    async fn next_account_number(
        &self,
        routing_key: &RoutingKey,
    ) -> Result<AccountNumber, DomainError>;

    /// # Errors
    ///
    /// - `UniqueViolation` if a company already exists for the signup or
    ///   the account number is taken
    async fn insert_company(&self, company: &Company) -> Result<(), DomainError>;

    /// Removes a company created by a failed provisioning attempt.
    /// Deleting a missing company is not an error.
    async fn delete_company(&self, id: &CompanyId) -> Result<(), DomainError>;

    async fn find_company(&self, id: &CompanyId) -> Result<Option<Company>, DomainError>;

    async fn find_company_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<Company>, DomainError>;

    /// # Errors
    ///
    /// - `UniqueViolation` if the user id or signup already has a profile
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError>;

    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError>;

    async fn find_profile_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<UserProfile>, DomainError>;

    /// # Errors
    ///
    /// - `UniqueViolation` if the user already belongs to the company
    async fn insert_membership(&self, membership: &Membership) -> Result<(), DomainError>;

    async fn find_membership(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Membership>, DomainError>;

    /// Profiles whose owner membership or billing customer is missing,
    /// ordered by `(created_at, id)` and starting after `after`.
    async fn list_incomplete_profiles(
        &self,
        after: Option<&ProfileCursor>,
        limit: u32,
    ) -> Result<Vec<UserProfile>, DomainError>;
}

/// Position of a profile in `list_incomplete_profiles` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCursor {
    pub created_at: Timestamp,
    pub user_id: UserId,
}

impl From<&UserProfile> for ProfileCursor {
    fn from(profile: &UserProfile) -> Self {
        Self {
            created_at: profile.created_at,
            user_id: profile.id.clone(),
        }
    }
}
