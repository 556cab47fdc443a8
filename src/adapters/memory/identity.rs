//! In-memory identity provider.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{IdentityProvider, NewIdentity};

#[derive(Debug, Default)]
struct IdentityState {
    identities: HashMap<UserId, NewIdentity>,
    deleted: Vec<UserId>,
    fail_create: bool,
    fail_delete: bool,
    create_delay: Option<Duration>,
}

/// Identity provider that keeps users in a map.
///
/// Like the real provider, a contact has at most one identity per routing key.
/// Failures and latency can be injected to exercise compensation paths.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    /// Delays the response of every `create_identity` call, for timeout
    /// tests. The identity is stored before the delay, as when a provider
    /// commits and the reply is lost.
    pub fn delay_create(&self, delay: Duration) {
        self.state().create_delay = Some(delay);
    }

    pub fn exists(&self, user_id: &UserId) -> bool {
        self.state().identities.contains_key(user_id)
    }

    pub fn count(&self) -> usize {
        self.state().identities.len()
    }

    pub fn deleted(&self) -> Vec<UserId> {
        self.state().deleted.clone()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserId, DomainError> {
        let delay = {
            let mut state = self.state();
            if state.fail_create {
                return Err(DomainError::external("identity provider unavailable"));
            }
            let taken = state.identities.iter().any(|(id, existing)| {
                *id == identity.user_id
                    || (existing.contact == identity.contact
                        && existing.routing_key == identity.routing_key)
            });
            if taken {
                return Err(DomainError::unique_violation("identity_username_key"));
            }
            state
                .identities
                .insert(identity.user_id.clone(), identity.clone());
            state.create_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(identity.user_id.clone())
    }

    async fn identity_exists(&self, user_id: &UserId) -> Result<bool, DomainError> {
        Ok(self.exists(user_id))
    }

    async fn delete_identity(&self, user_id: &UserId) -> Result<(), DomainError> {
        let mut state = self.state();
        if state.fail_delete {
            return Err(DomainError::external("identity provider refused delete"));
        }
        state.identities.remove(user_id);
        state.deleted.push(user_id.clone());
        Ok(())
    }
}
