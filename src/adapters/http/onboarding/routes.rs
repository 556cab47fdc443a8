//! Axum router configuration for onboarding endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_checkout, create_signup, handle_stripe_webhook, health, provision_account,
    resend_code, verify_code, OnboardingAppState,
};

/// Signup verification routes.
///
/// # Routes
/// - `POST /` - Create a signup request and send the code
/// - `POST /verify` - Verify a submitted code
/// - `POST /resend` - Send a fresh code
pub fn signup_routes() -> Router<OnboardingAppState> {
    Router::new()
        .route("/", post(create_signup))
        .route("/verify", post(verify_code))
        .route("/resend", post(resend_code))
}

/// Stripe webhook routes.
///
/// No user authentication; every request is verified via signature.
pub fn webhook_routes() -> Router<OnboardingAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete onboarding router.
///
/// ```ignore
/// let app = onboarding_router().with_state(app_state);
/// ```
pub fn onboarding_router() -> Router<OnboardingAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/signup", signup_routes())
        .route("/api/accounts/provision", post(provision_account))
        .route("/api/checkout", post(create_checkout))
        .nest("/api/webhooks", webhook_routes())
}
