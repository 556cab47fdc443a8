//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe: processor customer
//! lookup and creation, and hosted checkout sessions. Webhook verification
//! lives in `domain::billing` because it has no I/O.
//!
//! All secrets are handled via `secrecy::SecretString`.

mod mock_payment_provider;
mod stripe_adapter;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
