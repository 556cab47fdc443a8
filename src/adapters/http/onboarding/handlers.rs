//! HTTP handlers for onboarding endpoints.
//!
//! These handlers connect Axum routes to application layer command handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::{
    CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler, CreateSignupCommand,
    CreateSignupHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    ProvisionAccountCommand, ProvisionAccountHandler, ResendCodeCommand, ResendCodeHandler,
    TenantEnricher, VerifyCodeCommand, VerifyCodeHandler,
};
use crate::domain::billing::{CheckoutError, WebhookError, WebhookSignatureVerifier};
use crate::domain::foundation::SignupRequestId;
use crate::domain::signup::{SignupError, SignupPolicy};
use crate::domain::tenant::ProvisioningError;
use crate::ports::{
    Clock, CustomerRepository, IdentityProvider, LeadRepository, MessageChannel,
    PaymentProvider, SignupRepository, TenantRepository, WebhookEventRepository,
};

use super::dto::{
    CheckoutResponse, CreateCheckoutRequest, CreateSignupRequest, CreateSignupResponse,
    ErrorResponse, HealthResponse, ProvisionAccountResponse, ResendCodeResponse,
    SignupReferenceRequest, VerifyCodeRequest, VerifyCodeResponse, WebhookAckResponse,
};

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Settings shared by every request, built once from configuration.
#[derive(Clone)]
pub struct OnboardingSettings {
    pub signup_policy: SignupPolicy,
    pub provisioning_step_timeout: Duration,
    pub checkout: CheckoutSettings,
    pub webhook_verifier: WebhookSignatureVerifier,
}

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct OnboardingAppState {
    pub signup_repository: Arc<dyn SignupRepository>,
    pub tenant_repository: Arc<dyn TenantRepository>,
    pub customer_repository: Arc<dyn CustomerRepository>,
    pub lead_repository: Arc<dyn LeadRepository>,
    pub webhook_event_repository: Arc<dyn WebhookEventRepository>,
    pub message_channel: Arc<dyn MessageChannel>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<OnboardingSettings>,
}

impl OnboardingAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_signup_handler(&self) -> CreateSignupHandler {
        CreateSignupHandler::new(
            self.signup_repository.clone(),
            self.message_channel.clone(),
            self.clock.clone(),
            self.settings.signup_policy,
        )
    }

    pub fn verify_code_handler(&self) -> VerifyCodeHandler {
        VerifyCodeHandler::new(self.signup_repository.clone(), self.clock.clone())
    }

    pub fn resend_code_handler(&self) -> ResendCodeHandler {
        ResendCodeHandler::new(
            self.signup_repository.clone(),
            self.message_channel.clone(),
            self.clock.clone(),
            self.settings.signup_policy,
        )
    }

    pub fn tenant_enricher(&self) -> Arc<TenantEnricher> {
        Arc::new(TenantEnricher::new(
            self.tenant_repository.clone(),
            self.customer_repository.clone(),
            self.clock.clone(),
        ))
    }

    pub fn provision_account_handler(&self) -> ProvisionAccountHandler {
        ProvisionAccountHandler::new(
            self.signup_repository.clone(),
            self.tenant_repository.clone(),
            self.identity_provider.clone(),
            self.tenant_enricher(),
            self.clock.clone(),
            self.settings.provisioning_step_timeout,
        )
    }

    pub fn create_checkout_handler(&self) -> CreateCheckoutHandler {
        CreateCheckoutHandler::new(
            self.payment_provider.clone(),
            self.customer_repository.clone(),
            self.tenant_repository.clone(),
            self.clock.clone(),
            self.settings.checkout.clone(),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.settings.webhook_verifier.clone(),
            self.lead_repository.clone(),
            self.customer_repository.clone(),
            self.webhook_event_repository.clone(),
            self.settings.checkout.catalog.clone(),
            self.clock.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Signup Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/signup - Create a signup request and send its code
pub async fn create_signup(
    State(state): State<OnboardingAppState>,
    Json(request): Json<CreateSignupRequest>,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let handler = state.create_signup_handler();
    let cmd = CreateSignupCommand {
        display_name: request.display_name,
        company_name: request.company_name,
        contact: request.contact,
        email: request.email,
        routing_key: request.routing_key,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CreateSignupResponse::from(result))))
}

/// POST /api/signup/verify - Check a submitted code
pub async fn verify_code(
    State(state): State<OnboardingAppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let signup_id = parse_signup_id(&request.signup_id).map_err(SignupError::from)?;
    let handler = state.verify_code_handler();
    let cmd = VerifyCodeCommand {
        signup_id,
        code: request.code,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(VerifyCodeResponse::from(result)))
}

/// POST /api/signup/resend - Send a fresh code
pub async fn resend_code(
    State(state): State<OnboardingAppState>,
    Json(request): Json<SignupReferenceRequest>,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let signup_id = parse_signup_id(&request.signup_id).map_err(SignupError::from)?;
    let handler = state.resend_code_handler();

    let result = handler.handle(ResendCodeCommand { signup_id }).await?;

    Ok(Json(ResendCodeResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Provisioning and Billing Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/accounts/provision - Turn a verified signup into a tenant
///
/// Returns 201 for a fresh tenant and 200 when it already existed.
pub async fn provision_account(
    State(state): State<OnboardingAppState>,
    Json(request): Json<SignupReferenceRequest>,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let signup_id = parse_signup_id(&request.signup_id).map_err(ProvisioningError::from)?;
    let handler = state.provision_account_handler();

    let result = handler.handle(ProvisionAccountCommand { signup_id }).await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ProvisionAccountResponse::from(result))))
}

/// POST /api/checkout - Open a checkout session
pub async fn create_checkout(
    State(state): State<OnboardingAppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let handler = state.create_checkout_handler();
    let cmd = CreateCheckoutCommand {
        routing_key: request.routing_key,
        price_tier: request.price_tier,
        email: request.email,
        user_id: request.user_id,
        company_id: request.company_id,
        reference: request.reference,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /api/webhooks/stripe - Handle Stripe webhook events
pub async fn handle_stripe_webhook(
    State(state): State<OnboardingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, OnboardingApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;

    let handler = state.webhook_handler();
    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(result)))
}

/// GET /health - Liveness check
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

struct InvalidSignupId;

impl From<InvalidSignupId> for SignupError {
    fn from(_: InvalidSignupId) -> Self {
        SignupError::validation("signup_id", "must be a UUID")
    }
}

impl From<InvalidSignupId> for ProvisioningError {
    fn from(_: InvalidSignupId) -> Self {
        ProvisioningError::validation("signup_id", "must be a UUID")
    }
}

fn parse_signup_id(raw: &str) -> Result<SignupRequestId, InvalidSignupId> {
    raw.trim().parse().map_err(|_| InvalidSignupId)
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts component errors to HTTP responses.
#[derive(Debug)]
pub enum OnboardingApiError {
    Signup(SignupError),
    Provisioning(ProvisioningError),
    Checkout(CheckoutError),
    Webhook(WebhookError),
}

impl From<SignupError> for OnboardingApiError {
    fn from(err: SignupError) -> Self {
        Self::Signup(err)
    }
}

impl From<ProvisioningError> for OnboardingApiError {
    fn from(err: ProvisioningError) -> Self {
        Self::Provisioning(err)
    }
}

impl From<CheckoutError> for OnboardingApiError {
    fn from(err: CheckoutError) -> Self {
        Self::Checkout(err)
    }
}

impl From<WebhookError> for OnboardingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl OnboardingApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Signup(err) => match err {
                SignupError::Validation { .. } => StatusCode::BAD_REQUEST,
                SignupError::NotFound(_) => StatusCode::NOT_FOUND,
                SignupError::AlreadyVerified | SignupError::ConcurrentModification => {
                    StatusCode::CONFLICT
                }
                SignupError::Expired => StatusCode::GONE,
                SignupError::InvalidCode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SignupError::AttemptsExceeded => StatusCode::LOCKED,
                SignupError::ResendLimitReached => StatusCode::TOO_MANY_REQUESTS,
                SignupError::Upstream(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Provisioning(err) => match err {
                ProvisioningError::Validation { .. } => StatusCode::BAD_REQUEST,
                ProvisioningError::NotFound(_) => StatusCode::NOT_FOUND,
                ProvisioningError::NotVerified(_)
                | ProvisioningError::Conflict(_)
                | ProvisioningError::IdentityTaken(_) => StatusCode::CONFLICT,
                ProvisioningError::Upstream(_) => StatusCode::BAD_GATEWAY,
                ProvisioningError::CompensationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::Validation { .. } | CheckoutError::PriceNotConfigured(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::Upstream(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Webhook(err) => err.status_code(),
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            Self::Signup(err @ SignupError::InvalidCode { attempts_remaining }) => {
                ErrorResponse::with_details(
                    err.code(),
                    err.message(),
                    serde_json::json!({ "attempts_remaining": attempts_remaining }),
                )
            }
            Self::Signup(err) => ErrorResponse::new(err.code(), err.message()),
            Self::Provisioning(
                err @ ProvisioningError::CompensationFailed { identity_id, .. },
            ) => ErrorResponse::with_details(
                err.code(),
                err.message(),
                serde_json::json!({ "identity_id": identity_id }),
            ),
            Self::Provisioning(err) => ErrorResponse::new(err.code(), err.message()),
            Self::Checkout(err) => ErrorResponse::new(err.code(), err.message()),
            Self::Webhook(err) => ErrorResponse::new(err.code(), err.to_string()),
        }
    }
}

impl IntoResponse for OnboardingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = %body.code, message = %body.message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), code = %body.code, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<OnboardingApiError>) -> StatusCode {
        err.into().status_code()
    }

    #[test]
    fn signup_errors_map_to_distinct_statuses() {
        assert_eq!(
            status(SignupError::validation("contact", "empty")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(SignupError::NotFound(SignupRequestId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(SignupError::AlreadyVerified), StatusCode::CONFLICT);
        assert_eq!(status(SignupError::Expired), StatusCode::GONE);
        assert_eq!(
            status(SignupError::InvalidCode {
                attempts_remaining: 1
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(SignupError::AttemptsExceeded), StatusCode::LOCKED);
        assert_eq!(
            status(SignupError::ResendLimitReached),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(SignupError::upstream("sms down")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn provisioning_errors_map_to_statuses() {
        assert_eq!(
            status(ProvisioningError::NotVerified(SignupRequestId::new())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ProvisioningError::IdentityTaken("username".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ProvisioningError::upstream("identity timeout")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(ProvisioningError::CompensationFailed {
                identity_id: "u-1".to_string(),
                cause: "profile".to_string(),
                cleanup_error: "503".to_string(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn webhook_errors_use_their_own_status() {
        assert_eq!(
            status(WebhookError::InvalidSignature),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(WebhookError::CustomerNotFound("cus_1".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_code_body_carries_remaining_attempts() {
        let body = OnboardingApiError::from(SignupError::InvalidCode {
            attempts_remaining: 3,
        })
        .body();
        assert_eq!(body.code, "INVALID_CODE");
        assert_eq!(
            body.details,
            Some(serde_json::json!({ "attempts_remaining": 3 }))
        );
    }

    #[test]
    fn compensation_failure_body_names_identity() {
        let body = OnboardingApiError::from(ProvisioningError::CompensationFailed {
            identity_id: "u-9".to_string(),
            cause: "profile".to_string(),
            cleanup_error: "503".to_string(),
        })
        .body();
        assert_eq!(body.code, "COMPENSATION_FAILED");
        assert_eq!(body.details, Some(serde_json::json!({ "identity_id": "u-9" })));
    }

    #[test]
    fn signup_id_must_be_a_uuid() {
        assert!(parse_signup_id("not-a-uuid").is_err());
        let id = SignupRequestId::new();
        assert_eq!(parse_signup_id(&format!(" {} ", id)).ok(), Some(id));
    }
}
