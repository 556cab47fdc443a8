//! Signup verification errors.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | NotFound | 404 |
//! | AlreadyVerified | 409 |
//! | Expired | 410 |
//! | InvalidCode | 422 |
//! | AttemptsExceeded | 423 |
//! | ResendLimitReached | 429 |
//! | ConcurrentModification | 409 |
//! | Upstream | 502 |

use crate::domain::foundation::{DomainError, ErrorCode, SignupRequestId, ValidationError};

/// Errors raised while creating, verifying or resending a signup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupError {
    /// A field failed validation.
    Validation { field: String, message: String },

    /// No signup request with this id.
    NotFound(SignupRequestId),

    /// The request was already verified.
    AlreadyVerified,

    /// The code expired before it was verified.
    Expired,

    /// Too many wrong codes were submitted.
    AttemptsExceeded,

    /// The submitted code did not match.
    InvalidCode { attempts_remaining: u32 },

    /// No more codes may be sent for this request.
    ResendLimitReached,

    /// Another call updated the request first.
    ConcurrentModification,

    /// Storage or the message channel failed.
    Upstream(String),
}

impl SignupError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SignupError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        SignupError::Upstream(message.into())
    }

    /// Machine readable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SignupError::Validation { .. } => "VALIDATION_FAILED",
            SignupError::NotFound(_) => "SIGNUP_NOT_FOUND",
            SignupError::AlreadyVerified => "ALREADY_VERIFIED",
            SignupError::Expired => "CODE_EXPIRED",
            SignupError::AttemptsExceeded => "ATTEMPTS_EXCEEDED",
            SignupError::InvalidCode { .. } => "INVALID_CODE",
            SignupError::ResendLimitReached => "RESEND_LIMIT_REACHED",
            SignupError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            SignupError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    /// Message a person can act on.
    pub fn message(&self) -> String {
        match self {
            SignupError::Validation { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SignupError::NotFound(id) => format!("Signup request not found: {}", id),
            SignupError::AlreadyVerified => {
                "This signup has already been verified".to_string()
            }
            SignupError::Expired => {
                "The verification code has expired, please sign up again".to_string()
            }
            SignupError::AttemptsExceeded => {
                "Too many incorrect codes, please sign up again".to_string()
            }
            SignupError::InvalidCode { attempts_remaining } => format!(
                "Incorrect verification code, {} attempt(s) remaining",
                attempts_remaining
            ),
            SignupError::ResendLimitReached => {
                "No more codes can be sent for this signup".to_string()
            }
            SignupError::ConcurrentModification => {
                "The signup was updated concurrently, please retry".to_string()
            }
            SignupError::Upstream(msg) => format!("Service unavailable: {}", msg),
        }
    }

    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SignupError::Upstream(_) | SignupError::ConcurrentModification
        )
    }
}

impl std::fmt::Display for SignupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SignupError {}

impl From<ValidationError> for SignupError {
    fn from(err: ValidationError) -> Self {
        SignupError::validation(err.field(), err.to_string())
    }
}

impl From<DomainError> for SignupError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ConcurrencyConflict => SignupError::ConcurrentModification,
            ErrorCode::ValidationFailed => SignupError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => SignupError::Upstream(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_code_reports_remaining_attempts() {
        let err = SignupError::InvalidCode {
            attempts_remaining: 2,
        };
        assert_eq!(err.code(), "INVALID_CODE");
        assert!(err.message().contains("2 attempt(s) remaining"));
    }

    #[test]
    fn concurrency_conflict_maps_to_concurrent_modification() {
        let err: SignupError = DomainError::concurrency_conflict("version 3 is stale").into();
        assert_eq!(err, SignupError::ConcurrentModification);
        assert!(err.is_retryable());
    }

    #[test]
    fn database_failure_maps_to_upstream() {
        let err: SignupError = DomainError::database("connection reset").into();
        assert!(matches!(err, SignupError::Upstream(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_error_keeps_field_name() {
        let err: SignupError = ValidationError::empty_field("display_name").into();
        assert!(matches!(err, SignupError::Validation { ref field, .. } if field == "display_name"));
    }

    #[test]
    fn terminal_outcomes_are_not_retryable() {
        assert!(!SignupError::Expired.is_retryable());
        assert!(!SignupError::AttemptsExceeded.is_retryable());
        assert!(!SignupError::AlreadyVerified.is_retryable());
    }
}
