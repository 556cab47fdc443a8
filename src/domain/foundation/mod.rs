//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, the state machine trait and the
//! error types that form the vocabulary of the onboarding pipeline.

mod errors;
mod ids;
mod routing;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CompanyId, CustomerId, LeadId, MembershipId, SignupRequestId, UserId};
pub use routing::{parse_email, ContactAddress, RoutingKey};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
