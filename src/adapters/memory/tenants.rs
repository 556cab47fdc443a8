//! `TenantRepository` for the in-memory store.

use async_trait::async_trait;

use crate::domain::foundation::{CompanyId, DomainError, RoutingKey, SignupRequestId, UserId};
use crate::domain::tenant::{AccountNumber, Company, Membership, UserProfile};
use crate::ports::{ProfileCursor, TenantRepository};

use super::store::{duplicate, InMemoryStore, StoreOperation};

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn next_account_number(
        &self,
        routing_key: &RoutingKey,
    ) -> Result<AccountNumber, DomainError> {
        self.check(StoreOperation::NextAccountNumber).await?;
        let mut sequences = self.sequences.write().await;
        let value = sequences.entry(routing_key.clone()).or_insert(0);
        *value += 1;
        Ok(AccountNumber::from_sequence(routing_key, *value))
    }

    async fn insert_company(&self, company: &Company) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertCompany).await?;
        let mut companies = self.companies.write().await;
        if companies.contains_key(&company.id) {
            return Err(duplicate("companies_pkey"));
        }
        if companies
            .values()
            .any(|c| c.signup_request_id == company.signup_request_id)
        {
            return Err(duplicate("companies_signup_request_id_key"));
        }
        if companies.values().any(|c| {
            c.routing_key == company.routing_key && c.account_number == company.account_number
        }) {
            return Err(duplicate("companies_routing_key_account_number_key"));
        }
        companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn delete_company(&self, id: &CompanyId) -> Result<(), DomainError> {
        self.check(StoreOperation::DeleteCompany).await?;
        self.companies.write().await.remove(id);
        Ok(())
    }

    async fn find_company(&self, id: &CompanyId) -> Result<Option<Company>, DomainError> {
        Ok(self.companies.read().await.get(id).cloned())
    }

    async fn find_company_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<Company>, DomainError> {
        Ok(self
            .companies
            .read()
            .await
            .values()
            .find(|c| &c.signup_request_id == signup_request_id)
            .cloned())
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertProfile).await?;
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.id) {
            return Err(duplicate("user_profiles_pkey"));
        }
        if profiles
            .values()
            .any(|p| p.signup_request_id == profile.signup_request_id)
        {
            return Err(duplicate("user_profiles_signup_request_id_key"));
        }
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn find_profile_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<UserProfile>, DomainError> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .find(|p| &p.signup_request_id == signup_request_id)
            .cloned())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertMembership).await?;
        let mut memberships = self.memberships.write().await;
        if memberships
            .iter()
            .any(|m| m.user_id == membership.user_id && m.company_id == membership.company_id)
        {
            return Err(duplicate("memberships_user_id_company_id_key"));
        }
        memberships.push(membership.clone());
        Ok(())
    }

    async fn find_membership(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Membership>, DomainError> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .find(|m| &m.user_id == user_id && &m.company_id == company_id)
            .cloned())
    }

    async fn list_incomplete_profiles(
        &self,
        after: Option<&ProfileCursor>,
        limit: u32,
    ) -> Result<Vec<UserProfile>, DomainError> {
        let position = |p: &UserProfile| (p.created_at, p.id.as_str().to_string());
        let start = after.map(|c| (c.created_at, c.user_id.as_str().to_string()));
        let profiles = self.profiles.read().await;
        let memberships = self.memberships.read().await;
        let customers = self.customers.read().await;

        let mut incomplete: Vec<UserProfile> = profiles
            .values()
            .filter(|p| {
                let has_membership = memberships
                    .iter()
                    .any(|m| m.user_id == p.id && m.company_id == p.company_id);
                let has_customer = customers.values().any(|c| {
                    c.company_id == Some(p.company_id) && c.routing_key == p.routing_key
                });
                !(has_membership && has_customer)
            })
            .filter(|p| start.as_ref().map_or(true, |start| position(p) > *start))
            .cloned()
            .collect();
        incomplete.sort_by_key(position);
        incomplete.truncate(limit as usize);
        Ok(incomplete)
    }
}
