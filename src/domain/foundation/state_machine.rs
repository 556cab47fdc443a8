//! State machine trait for lifecycle enums.
//!
//! Signup requests, leads and billing statuses all move through explicit
//! states. Implementors list the legal edges once; callers go through
//! `transition_to` so an illegal move surfaces as an error instead of a
//! silently overwritten field.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for LeadStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Abandoned, Converted) | (Converted, Converted))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Abandoned => vec![Abandoned, Converted],
///             Converted => vec![Converted],
///         }
///     }
/// }
///
/// let next = lead.status.transition_to(LeadStatus::Converted)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no outgoing transitions other than itself).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().iter().all(|target| target == self)
    }
}
