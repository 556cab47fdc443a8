//! Billing handlers.
//!
//! ## Commands
//! - Opening checkout sessions (identified and payment-first)
//! - Processing Stripe webhooks

mod create_checkout;
mod handle_payment_webhook;

pub use create_checkout::{
    CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult,
};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
