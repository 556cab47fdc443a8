//! Lead repository port.

use crate::domain::billing::Lead;
use crate::domain::foundation::{DomainError, RoutingKey};
use async_trait::async_trait;

/// Persists leads keyed by checkout session and by (email, routing key).
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Lead>, DomainError>;

    async fn find_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<Lead>, DomainError>;

    /// # Errors
    ///
    /// - `UniqueViolation` if a lead exists for the session or the
    ///   (email, routing key) pair
    async fn insert(&self, lead: &Lead) -> Result<(), DomainError>;

    /// Conditional on `lead.version`, stores `version + 1`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the stored version differs
    async fn update(&self, lead: &Lead) -> Result<(), DomainError>;
}
