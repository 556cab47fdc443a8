//! Identity provider port - external authentication entries.
//!
//! The identity created here is the one external side effect of provisioning
//! that storage cannot roll back, so callers must delete it themselves when a
//! later step fails. Identities are created under an id chosen by the caller,
//! so an attempt whose response was lost can be found again.

use crate::domain::foundation::{ContactAddress, DomainError, RoutingKey, UserId};
use async_trait::async_trait;

/// Data needed to create a human user at the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    /// Id the identity is created under.
    pub user_id: UserId,
    pub display_name: String,
    pub contact: ContactAddress,
    pub email: Option<String>,
    pub routing_key: RoutingKey,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the identity and returns its id.
    ///
    /// Fails with `ErrorCode::UniqueViolation` when the id is taken or the
    /// contact already has an identity under the same routing key.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserId, DomainError>;

    async fn identity_exists(&self, user_id: &UserId) -> Result<bool, DomainError>;

    /// Deletes an identity. Deleting a missing identity is not an error.
    async fn delete_identity(&self, user_id: &UserId) -> Result<(), DomainError>;
}
