//! Billing module - checkout correlation, leads and Stripe webhooks.

mod catalog;
mod errors;
mod lead;
mod metadata;
mod stripe_event;
mod webhook_verifier;

pub use catalog::PriceCatalog;
pub use errors::{CheckoutError, WebhookError};
pub use lead::{CheckoutIdentifiers, Lead, LeadStatus, LeadUpdate};
pub use metadata::{
    CheckoutMetadata, CheckoutMode, CustomerType, KEY_COMPANY_ID, KEY_CUSTOMER_TYPE,
    KEY_REFERENCE, KEY_ROUTING_KEY, KEY_USER_ID,
};
pub use stripe_event::{
    CheckoutSessionObject, CustomerDetails, InvoiceObject, StripeEvent, StripeEventData,
    StripeEventType, SubscriptionObject,
};
pub use webhook_verifier::{sign_payload, SignatureHeader, WebhookSignatureVerifier};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
