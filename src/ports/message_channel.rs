//! Message channel port - delivers verification codes.

use crate::domain::foundation::{ContactAddress, DomainError};
use async_trait::async_trait;

/// Outbound text delivery (SMS or email).
///
/// `Ok` means the provider accepted the message, not that it arrived.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, to: &ContactAddress, body: &str) -> Result<(), DomainError>;
}
