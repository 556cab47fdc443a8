//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports and are
//! injected into handlers as `Arc<dyn Port>`.
//!
//! ## Storage Ports
//!
//! - `SignupRepository` - Signup requests (versioned writes)
//! - `TenantRepository` - Companies, profiles, memberships, account numbers
//! - `CustomerRepository` - Local billing records
//! - `LeadRepository` - Checkout leads
//! - `WebhookEventRepository` - Stripe webhook idempotency ledger
//!
//! ## External Service Ports
//!
//! - `MessageChannel` - SMS / email delivery of verification codes
//! - `IdentityProvider` - External authentication entries
//! - `PaymentProvider` - Processor customers and checkout sessions
//! - `Clock` - Current time

mod clock;
mod customer_repository;
mod identity_provider;
mod lead_repository;
mod message_channel;
mod payment_provider;
mod signup_repository;
mod tenant_repository;
mod webhook_event_repository;

pub use clock::{Clock, SystemClock};
pub use customer_repository::CustomerRepository;
pub use identity_provider::{IdentityProvider, NewIdentity};
pub use lead_repository::LeadRepository;
pub use message_channel::MessageChannel;
pub use payment_provider::{
    CheckoutHandle, CheckoutSessionRequest, CreateCustomerRequest, PaymentProvider,
    ProcessorCustomer,
};
pub use signup_repository::SignupRepository;
pub use tenant_repository::{ProfileCursor, TenantRepository};
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
