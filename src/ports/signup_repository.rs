//! Signup repository port.
//!
//! Persists SignupRequest aggregates for the verification ledger.
//!
//! # Design
//!
//! - **Conditional writes**: `update` succeeds only if the stored version
//!   equals the aggregate's version, then bumps it
//! - **No locks**: concurrent verify calls race on the version, one wins

use crate::domain::foundation::{DomainError, SignupRequestId};
use crate::domain::signup::SignupRequest;
use async_trait::async_trait;

/// Repository port for signup requests.
#[async_trait]
pub trait SignupRepository: Send + Sync {
    /// Save a new request.
    ///
    /// # Errors
    ///
    /// - `UniqueViolation` if the id already exists
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, request: &SignupRequest) -> Result<(), DomainError>;

    /// Find a request by id.
    async fn find_by_id(&self, id: &SignupRequestId)
        -> Result<Option<SignupRequest>, DomainError>;

    /// Write the request if nobody changed it since it was loaded.
    ///
    /// Stores `request` with `version + 1`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the stored version differs
    /// - `NotFound` if the request does not exist
    async fn update(&self, request: &SignupRequest) -> Result<(), DomainError>;
}
