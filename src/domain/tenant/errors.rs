//! Provisioning error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | NotFound | 404 |
//! | NotVerified | 409 |
//! | Conflict | 409 |
//! | IdentityTaken | 409 |
//! | Upstream | 502 |
//! | CompensationFailed | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, SignupRequestId};

/// Errors raised while turning a verified signup into a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Input failed validation.
    Validation { field: String, message: String },

    /// No signup request with this id.
    NotFound(SignupRequestId),

    /// The signup exists but has not been verified.
    NotVerified(SignupRequestId),

    /// A tenant for this signup already exists (unique constraint hit).
    /// Callers treat this as success and re-fetch.
    Conflict(String),

    /// The contact already belongs to an identity this signup did not
    /// create. Retrying will not help.
    IdentityTaken(String),

    /// Storage or the identity provider failed. Everything created in the
    /// attempt was rolled back.
    Upstream(String),

    /// A core step failed and the identity created in the same attempt could
    /// not be deleted. The identity is orphaned until an operator removes it.
    CompensationFailed {
        identity_id: String,
        cause: String,
        cleanup_error: String,
    },
}

impl ProvisioningError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ProvisioningError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ProvisioningError::Conflict(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ProvisioningError::Upstream(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProvisioningError::Validation { .. } => "VALIDATION_FAILED",
            ProvisioningError::NotFound(_) => "SIGNUP_NOT_FOUND",
            ProvisioningError::NotVerified(_) => "SIGNUP_NOT_VERIFIED",
            ProvisioningError::Conflict(_) => "ALREADY_PROVISIONED",
            ProvisioningError::IdentityTaken(_) => "IDENTITY_EXISTS",
            ProvisioningError::Upstream(_) => "UPSTREAM_FAILURE",
            ProvisioningError::CompensationFailed { .. } => "COMPENSATION_FAILED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProvisioningError::Validation { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            ProvisioningError::NotFound(id) => format!("Signup request not found: {}", id),
            ProvisioningError::NotVerified(id) => {
                format!("Signup request {} must be verified before provisioning", id)
            }
            ProvisioningError::Conflict(msg) => {
                format!("Account already provisioned, fetch it instead: {}", msg)
            }
            ProvisioningError::IdentityTaken(msg) => {
                format!("Contact is already registered with another account: {}", msg)
            }
            ProvisioningError::Upstream(msg) => {
                format!("Provisioning failed and was rolled back, please retry: {}", msg)
            }
            ProvisioningError::CompensationFailed {
                identity_id,
                cause,
                cleanup_error,
            } => format!(
                "Provisioning failed ({}) and identity {} could not be removed ({})",
                cause, identity_id, cleanup_error
            ),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisioningError::Upstream(_))
    }
}

impl std::fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ProvisioningError {}

impl From<DomainError> for ProvisioningError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::UniqueViolation => ProvisioningError::Conflict(err.message),
            ErrorCode::ValidationFailed => ProvisioningError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => ProvisioningError::Upstream(err.to_string()),
        }
    }
}
