//! Signup request lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Where a signup request is in its verification lifecycle.
///
/// ```text
/// Created ──deliver──▶ CodeSent ──match──▶ Verified
///    │  ╲                 │  ╲
///    │   ╲──match──▶ Verified ╲──ttl──▶ Expired
///    └──ttl / lockout──▶ Expired | Locked
/// ```
///
/// `Verified`, `Expired` and `Locked` are terminal: a new request must be
/// created to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupState {
    /// Persisted, code not (yet) accepted by the message channel.
    Created,
    /// The channel accepted the code for delivery.
    CodeSent,
    /// A submitted code matched. The stored code has been cleared.
    Verified,
    /// The expiry window passed before a match.
    Expired,
    /// Too many mismatched submissions.
    Locked,
}

impl SignupState {
    /// Returns true while a code can still be submitted or resent.
    pub fn is_open(&self) -> bool {
        matches!(self, SignupState::Created | SignupState::CodeSent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignupState::Created => "created",
            SignupState::CodeSent => "code_sent",
            SignupState::Verified => "verified",
            SignupState::Expired => "expired",
            SignupState::Locked => "locked",
        }
    }
}

impl StateMachine for SignupState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SignupState::*;
        matches!(
            (self, target),
            (Created, Created)
                | (Created, CodeSent)
                | (Created, Verified)
                | (Created, Expired)
                | (Created, Locked)
                | (CodeSent, CodeSent)
                | (CodeSent, Verified)
                | (CodeSent, Expired)
                | (CodeSent, Locked)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SignupState::*;
        match self {
            Created => vec![Created, CodeSent, Verified, Expired, Locked],
            CodeSent => vec![CodeSent, Verified, Expired, Locked],
            Verified | Expired | Locked => vec![],
        }
    }
}

impl fmt::Display for SignupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignupState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SignupState::Created),
            "code_sent" => Ok(SignupState::CodeSent),
            "verified" => Ok(SignupState::Verified),
            "expired" => Ok(SignupState::Expired),
            "locked" => Ok(SignupState::Locked),
            other => Err(ValidationError::invalid_format(
                "signup_state",
                format!("unknown state '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_states_accept_codes() {
        assert!(SignupState::Created.is_open());
        assert!(SignupState::CodeSent.is_open());
        assert!(!SignupState::Verified.is_open());
        assert!(!SignupState::Expired.is_open());
        assert!(!SignupState::Locked.is_open());
    }

    #[test]
    fn closed_states_are_terminal() {
        for state in [SignupState::Verified, SignupState::Expired, SignupState::Locked] {
            assert!(state.is_terminal(), "{:?} should be terminal", state);
            assert!(state.transition_to(SignupState::CodeSent).is_err());
        }
    }

    #[test]
    fn verified_cannot_go_back_to_code_sent() {
        assert!(!SignupState::Verified.can_transition_to(&SignupState::CodeSent));
    }

    #[test]
    fn code_sent_cannot_return_to_created() {
        assert!(!SignupState::CodeSent.can_transition_to(&SignupState::Created));
    }

    #[test]
    fn parses_storage_representation() {
        for state in [
            SignupState::Created,
            SignupState::CodeSent,
            SignupState::Verified,
            SignupState::Expired,
            SignupState::Locked,
        ] {
            assert_eq!(state.as_str().parse::<SignupState>().unwrap(), state);
        }
        assert!("pending".parse::<SignupState>().is_err());
    }
}
