//! `SignupRepository` for the in-memory store.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SignupRequestId};
use crate::domain::signup::SignupRequest;
use crate::ports::SignupRepository;

use super::store::{conflict, duplicate, missing, InMemoryStore, StoreOperation};

#[async_trait]
impl SignupRepository for InMemoryStore {
    async fn insert(&self, request: &SignupRequest) -> Result<(), DomainError> {
        self.check(StoreOperation::InsertSignup).await?;
        let mut signups = self.signups.write().await;
        if signups.contains_key(&request.id) {
            return Err(duplicate("signup_requests_pkey"));
        }
        signups.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SignupRequestId,
    ) -> Result<Option<SignupRequest>, DomainError> {
        Ok(self.signups.read().await.get(id).cloned())
    }

    async fn update(&self, request: &SignupRequest) -> Result<(), DomainError> {
        self.check(StoreOperation::UpdateSignup).await?;
        let mut signups = self.signups.write().await;
        let stored = signups
            .get_mut(&request.id)
            .ok_or_else(|| missing("signup request", request.id))?;
        if stored.version != request.version {
            return Err(conflict("signup request", request.id, request.version));
        }
        let mut next = request.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}
