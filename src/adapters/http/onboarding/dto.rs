//! HTTP DTOs (Data Transfer Objects) for onboarding endpoints.
//!
//! These types define the JSON request/response structure for the onboarding
//! API. They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{
    CreateCheckoutResult, CreateSignupResult, HandlePaymentWebhookResult, ProvisionAccountResult,
    ResendCodeResult, VerifyCodeResult,
};
use crate::domain::billing::CheckoutMode;
use crate::domain::foundation::Timestamp;
use crate::domain::signup::SignupState;
use crate::domain::tenant::{PaymentStatus, TenantBundle};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a signup.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSignupRequest {
    pub display_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    /// Phone number (E.164) or email address the code is sent to.
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    pub routing_key: String,
}

/// Request to verify a submitted code.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeRequest {
    pub signup_id: String,
    pub code: String,
}

/// Request naming an existing signup (resend and provision).
#[derive(Debug, Clone, Deserialize)]
pub struct SignupReferenceRequest {
    pub signup_id: String,
}

/// Request to open a checkout session.
///
/// Without `email`, `user_id` and `company_id` the session is opened in
/// payment-first mode.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    pub routing_key: String,
    pub price_tier: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct CreateSignupResponse {
    pub signup_id: String,
    pub state: SignupState,
    pub expires_at: Timestamp,
}

impl From<CreateSignupResult> for CreateSignupResponse {
    fn from(result: CreateSignupResult) -> Self {
        Self {
            signup_id: result.signup_id.to_string(),
            state: result.state,
            expires_at: result.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyCodeResponse {
    pub signup_id: String,
    pub verified: bool,
    pub verified_at: Timestamp,
}

impl From<VerifyCodeResult> for VerifyCodeResponse {
    fn from(result: VerifyCodeResult) -> Self {
        Self {
            signup_id: result.signup_id.to_string(),
            verified: true,
            verified_at: result.verified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResendCodeResponse {
    pub signup_id: String,
    pub expires_at: Timestamp,
    pub resends_remaining: u32,
}

impl From<ResendCodeResult> for ResendCodeResponse {
    fn from(result: ResendCodeResult) -> Self {
        Self {
            signup_id: result.signup_id.to_string(),
            expires_at: result.expires_at,
            resends_remaining: result.resends_remaining,
        }
    }
}

/// Provisioned tenant summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionAccountResponse {
    /// False when the tenant already existed and was re-fetched.
    pub created: bool,
    pub company_id: String,
    pub company_name: String,
    pub account_number: String,
    pub routing_key: String,
    pub user_id: String,
    pub membership_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    /// False while the membership or billing record is still missing.
    pub complete: bool,
}

impl From<ProvisionAccountResult> for ProvisionAccountResponse {
    fn from(result: ProvisionAccountResult) -> Self {
        let complete = result.bundle.is_complete();
        let TenantBundle {
            company,
            profile,
            membership,
            customer,
        } = result.bundle;

        Self {
            created: result.created,
            company_id: company.id.to_string(),
            company_name: company.name,
            account_number: company.account_number.to_string(),
            routing_key: company.routing_key.as_str().to_string(),
            user_id: profile.id.as_str().to_string(),
            membership_id: membership.map(|m| m.id.to_string()),
            payment_status: customer.as_ref().map(|c| c.payment_status),
            customer_id: customer.map(|c| c.id.to_string()),
            complete,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
    pub mode: CheckoutMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
}

impl From<CreateCheckoutResult> for CheckoutResponse {
    fn from(result: CreateCheckoutResult) -> Self {
        Self {
            session_id: result.session_id,
            checkout_url: result.url,
            mode: result.mode,
            stripe_customer_id: result.stripe_customer_id,
        }
    }
}

/// Acknowledgement returned to Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub event_id: String,
    /// "processed", "duplicate" or "ignored".
    pub outcome: &'static str,
}

impl From<HandlePaymentWebhookResult> for WebhookAckResponse {
    fn from(result: HandlePaymentWebhookResult) -> Self {
        let (event_id, outcome) = match result {
            HandlePaymentWebhookResult::Processed { event_id, .. } => (event_id, "processed"),
            HandlePaymentWebhookResult::Duplicate { event_id } => (event_id, "duplicate"),
            HandlePaymentWebhookResult::Ignored { event_id, .. } => (event_id, "ignored"),
        };
        Self {
            received: true,
            event_id,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SignupRequestId;

    #[test]
    fn checkout_request_fields_are_optional() {
        let json = r#"{"routing_key":"textline","price_tier":"growth"}"#;
        let request: CreateCheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.price_tier, "growth");
        assert!(request.email.is_none());
        assert!(request.company_id.is_none());
    }

    #[test]
    fn signup_response_serializes_state_in_snake_case() {
        let response = CreateSignupResponse::from(CreateSignupResult {
            signup_id: SignupRequestId::new(),
            state: SignupState::CodeSent,
            expires_at: Timestamp::from_unix_secs(1_700_000_900),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["state"], "code_sent");
    }

    #[test]
    fn webhook_ack_names_outcome() {
        let ack = WebhookAckResponse::from(HandlePaymentWebhookResult::Duplicate {
            event_id: "evt_1".to_string(),
        });
        assert!(ack.received);
        assert_eq!(ack.outcome, "duplicate");
        assert_eq!(ack.event_id, "evt_1");
    }

    #[test]
    fn error_response_omits_empty_details() {
        let json = serde_json::to_value(ErrorResponse::new("SIGNUP_NOT_FOUND", "missing")).unwrap();
        assert_eq!(json["code"], "SIGNUP_NOT_FOUND");
        assert!(json.get("details").is_none());
    }
}
