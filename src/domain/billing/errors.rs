//! Checkout and webhook error types.

use http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors that occur during webhook processing.
///
/// The status code decides what Stripe does next: 2xx acknowledges, 4xx
/// rejects without retry, 5xx schedules a retry.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Test-mode event delivered to an endpoint that requires live mode.
    #[error("Livemode mismatch")]
    LivemodeMismatch,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing or malformed.
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// No local customer for the processor customer yet.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_) | WebhookError::CustomerNotFound(_)
        )
    }

    /// Machine readable error code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            WebhookError::InvalidTimestamp => "INVALID_TIMESTAMP",
            WebhookError::LivemodeMismatch => "LIVEMODE_MISMATCH",
            WebhookError::ParseError(_) => "INVALID_PAYLOAD",
            WebhookError::MissingMetadata(_) => "MISSING_METADATA",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            WebhookError::Ignored(_) => "EVENT_IGNORED",
            WebhookError::Database(_) => "STORAGE_FAILURE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::InvalidTimestamp
            | WebhookError::LivemodeMismatch
            | WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::Ignored(_) => StatusCode::OK,

            // Subscription events can outrun the checkout that creates the customer.
            WebhookError::CustomerNotFound(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

impl From<ValidationError> for WebhookError {
    fn from(err: ValidationError) -> Self {
        WebhookError::MissingMetadata(err.to_string())
    }
}

/// Errors raised while opening a checkout session.
///
/// | Error | HTTP Status |
/// |-------|-------------|
/// | Validation | 400 |
/// | PriceNotConfigured | 400 |
/// | Upstream | 502 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    Validation { field: String, message: String },
    PriceNotConfigured(String),
    Upstream(String),
}

impl CheckoutError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation { .. } => "VALIDATION_FAILED",
            CheckoutError::PriceNotConfigured(_) => "PRICE_NOT_CONFIGURED",
            CheckoutError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    pub fn message(&self) -> String {
        match self {
            CheckoutError::Validation { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            CheckoutError::PriceNotConfigured(tier) => {
                format!("No price is configured for tier '{}'", tier)
            }
            CheckoutError::Upstream(msg) => format!("Payment provider unavailable: {}", msg),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Upstream(_))
    }
}

impl std::fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CheckoutError {}

impl From<ValidationError> for CheckoutError {
    fn from(err: ValidationError) -> Self {
        CheckoutError::validation(err.field(), err.to_string())
    }
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => CheckoutError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => CheckoutError::Upstream(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_are_rejected_without_retry() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), StatusCode::UNAUTHORIZED);
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn missing_customer_is_retried() {
        let err = WebhookError::CustomerNotFound("cus_1".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn ignored_events_are_acknowledged() {
        let err = WebhookError::Ignored("customer.tax_id.created".to_string());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(!err.is_retryable());
    }

    #[test]
    fn malformed_payloads_are_bad_requests() {
        assert_eq!(
            WebhookError::MissingField("customer").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::ParseError("eof".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_failure_becomes_retryable_database_error() {
        let err: WebhookError = DomainError::database("pool timed out").into();
        assert!(matches!(err, WebhookError::Database(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn checkout_upstream_is_retryable() {
        let err: CheckoutError = DomainError::external("stripe 503").into();
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
        assert!(err.is_retryable());
    }
}
