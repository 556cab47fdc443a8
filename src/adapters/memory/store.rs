//! In-memory store backing every storage port.
//!
//! One struct implements `SignupRepository`, `TenantRepository`,
//! `CustomerRepository`, `LeadRepository` and `WebhookEventRepository`, so a
//! single `Arc<InMemoryStore>` can be handed to every handler. Unique
//! constraints and versioned writes mirror the PostgreSQL schema.
//!
//! Not suitable for production: nothing survives a restart.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::domain::billing::Lead;
use crate::domain::foundation::{
    CompanyId, CustomerId, DomainError, ErrorCode, LeadId, RoutingKey, SignupRequestId, UserId,
};
use crate::domain::signup::SignupRequest;
use crate::domain::tenant::{Company, Customer, Membership, UserProfile};
use crate::ports::WebhookEventRecord;

/// Store operations that tests can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    InsertSignup,
    UpdateSignup,
    NextAccountNumber,
    InsertCompany,
    DeleteCompany,
    InsertProfile,
    InsertMembership,
    InsertCustomer,
    UpdateCustomer,
    InsertLead,
    UpdateLead,
    SaveWebhookEvent,
}

/// In-memory implementation of the storage ports.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub(super) signups: RwLock<HashMap<SignupRequestId, SignupRequest>>,
    pub(super) companies: RwLock<HashMap<CompanyId, Company>>,
    pub(super) sequences: RwLock<HashMap<RoutingKey, i64>>,
    pub(super) profiles: RwLock<HashMap<UserId, UserProfile>>,
    pub(super) memberships: RwLock<Vec<Membership>>,
    pub(super) customers: RwLock<HashMap<CustomerId, Customer>>,
    pub(super) leads: RwLock<HashMap<LeadId, Lead>>,
    pub(super) webhook_events: RwLock<HashMap<String, WebhookEventRecord>>,
    failures: RwLock<HashSet<StoreOperation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `operation` fail with a database error.
    pub async fn fail(&self, operation: StoreOperation) {
        self.failures.write().await.insert(operation);
    }

    /// Undoes [`InMemoryStore::fail`].
    pub async fn recover(&self, operation: StoreOperation) {
        self.failures.write().await.remove(&operation);
    }

    pub(super) async fn check(&self, operation: StoreOperation) -> Result<(), DomainError> {
        if self.failures.read().await.contains(&operation) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("injected failure for {:?}", operation),
            ));
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════
    // Snapshots for assertions
    // ════════════════════════════════════════════════════════════════════

    pub async fn all_companies(&self) -> Vec<Company> {
        self.companies.read().await.values().cloned().collect()
    }

    pub async fn all_profiles(&self) -> Vec<UserProfile> {
        self.profiles.read().await.values().cloned().collect()
    }

    pub async fn all_memberships(&self) -> Vec<Membership> {
        self.memberships.read().await.clone()
    }

    pub async fn all_customers(&self) -> Vec<Customer> {
        self.customers.read().await.values().cloned().collect()
    }

    pub async fn all_leads(&self) -> Vec<Lead> {
        self.leads.read().await.values().cloned().collect()
    }

    pub async fn webhook_event_count(&self) -> usize {
        self.webhook_events.read().await.len()
    }
}

pub(super) fn conflict(entity: &str, id: impl std::fmt::Display, expected: i64) -> DomainError {
    DomainError::concurrency_conflict(format!(
        "{} {} changed since version {}",
        entity, id, expected
    ))
}

pub(super) fn duplicate(constraint: &str) -> DomainError {
    DomainError::unique_violation(format!("duplicate key violates {}", constraint))
        .with_detail("constraint", constraint)
}

pub(super) fn missing(entity: &str, id: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::NotFound, format!("{} {} not found", entity, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failures_can_be_recovered() {
        let store = InMemoryStore::new();
        store.fail(StoreOperation::InsertCompany).await;
        let err = store.check(StoreOperation::InsertCompany).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(store.check(StoreOperation::InsertProfile).await.is_ok());

        store.recover(StoreOperation::InsertCompany).await;
        assert!(store.check(StoreOperation::InsertCompany).await.is_ok());
    }
}
