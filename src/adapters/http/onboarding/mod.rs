//! HTTP adapter for the onboarding pipeline.
//!
//! - `POST /api/signup` - Create a signup request
//! - `POST /api/signup/verify` - Verify a code
//! - `POST /api/signup/resend` - Resend a code
//! - `POST /api/accounts/provision` - Provision a tenant from a verified signup
//! - `POST /api/checkout` - Open a checkout session
//! - `POST /api/webhooks/stripe` - Handle Stripe webhooks
//! - `GET /health` - Liveness check

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{OnboardingApiError, OnboardingAppState, OnboardingSettings};
pub use routes::onboarding_router;
