//! Payment provider port for external payment processing.
//!
//! Covers what the checkout orchestrator needs from the processor: payer
//! lookup and creation, and hosted checkout sessions. Processor events come
//! back through the webhook endpoint, not through this port.
//!
//! # Design
//!
//! - **Gateway agnostic**: Interface works with any payment provider
//! - **Idempotent**: creation calls carry an idempotency key

use crate::domain::foundation::{DomainError, RoutingKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Finds an existing payer by email among those created for this
    /// routing key. Payers of other brands are never returned.
    async fn find_customer_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<ProcessorCustomer>, DomainError>;

    /// Creates a payer.
    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<ProcessorCustomer, DomainError>;

    /// Opens a hosted subscription checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutHandle, DomainError>;
}

/// A payer record held by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCustomer {
    pub id: String,
    pub email: Option<String>,
    /// Routing key from the payer's metadata.
    pub routing_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Request to open a checkout session.
///
/// Exactly one of `customer_id` (identified mode) or neither customer field
/// (payment-first mode, processor creates the payer) is expected;
/// `customer_email` only prefills the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: Option<String>,
    /// Written to both session and subscription metadata.
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Where to send the payer, and the session to correlate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutHandle {
    pub session_id: String,
    pub url: String,
}
