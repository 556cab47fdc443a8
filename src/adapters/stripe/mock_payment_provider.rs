//! Mock payment provider for testing.
//!
//! Provides a configurable mock implementation of `PaymentProvider` for unit
//! and integration tests, and for running the API without Stripe keys.
//! Supports:
//! - Pre-registered processor customers (looked up by email and routing key)
//! - Idempotency keys on customer and session creation
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::billing::KEY_ROUTING_KEY;
use crate::domain::foundation::{DomainError, RoutingKey};
use crate::ports::{
    CheckoutHandle, CheckoutSessionRequest, CreateCustomerRequest, PaymentProvider,
    ProcessorCustomer,
};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_customer(ProcessorCustomer {
///     id: "cus_123".into(),
///     email: Some("a@b.co".into()),
///     routing_key: Some("textline".into()),
/// });
/// mock.set_method_error("create_checkout_session", DomainError::external("down"));
/// ```
#[derive(Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Processor customers by id.
    customers: HashMap<String, ProcessorCustomer>,

    /// Every checkout session opened, in order.
    sessions: Vec<CheckoutSessionRequest>,

    /// Customers created through `create_customer`, by idempotency key.
    idempotent_customers: HashMap<String, ProcessorCustomer>,

    /// Sessions opened through `create_checkout_session`, by idempotency key.
    idempotent_sessions: HashMap<String, CheckoutHandle>,

    /// Specific errors by method name.
    method_errors: HashMap<String, DomainError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    next_id: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a customer to the "processor".
    pub fn add_customer(&self, customer: ProcessorCustomer) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: DomainError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Checkout sessions opened so far.
    pub fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.state().sessions.clone()
    }

    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), DomainError> {
        match self.state().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Clone for MockPaymentProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn find_customer_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<ProcessorCustomer>, DomainError> {
        self.record_call(
            "find_customer_by_email",
            vec![email.to_string(), routing_key.to_string()],
        );
        self.check_error("find_customer_by_email")?;

        let state = self.state();
        let mut matches: Vec<&ProcessorCustomer> = state
            .customers
            .values()
            .filter(|c| {
                c.email.as_deref() == Some(email)
                    && c.routing_key.as_deref() == Some(routing_key.as_str())
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.first().map(|c| (*c).clone()))
    }

    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<ProcessorCustomer, DomainError> {
        self.record_call("create_customer", vec![request.email.clone()]);
        self.check_error("create_customer")?;

        let mut state = self.state();
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state.idempotent_customers.get(key) {
                return Ok(existing.clone());
            }
        }

        state.next_id += 1;
        let customer = ProcessorCustomer {
            id: format!("cus_mock_{}", state.next_id),
            email: Some(request.email.clone()),
            routing_key: request.metadata.get(KEY_ROUTING_KEY).cloned(),
        };
        state
            .customers
            .insert(customer.id.clone(), customer.clone());
        if let Some(key) = &request.idempotency_key {
            state
                .idempotent_customers
                .insert(key.clone(), customer.clone());
        }
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutHandle, DomainError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.customer_id.clone().unwrap_or_default(),
                request.price_id.clone(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.state();
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state.idempotent_sessions.get(key) {
                return Ok(existing.clone());
            }
        }

        state.next_id += 1;
        let session_id = format!("cs_mock_{}", state.next_id);
        state.sessions.push(request.clone());
        let handle = CheckoutHandle {
            url: format!("https://checkout.stripe.com/c/pay/{}", session_id),
            session_id,
        };
        if let Some(key) = &request.idempotency_key {
            state.idempotent_sessions.insert(key.clone(), handle.clone());
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn customer_request(key: Option<&str>) -> CreateCustomerRequest {
        CreateCustomerRequest {
            email: "owner@example.com".to_string(),
            name: None,
            metadata: BTreeMap::from([(KEY_ROUTING_KEY.to_string(), "textline".to_string())]),
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn created_customer_is_found_by_email_within_its_brand() {
        let mock = MockPaymentProvider::new();
        let created = mock.create_customer(&customer_request(None)).await.unwrap();

        let found = mock
            .find_customer_by_email("owner@example.com", &RoutingKey::new("textline").unwrap())
            .await
            .unwrap();
        assert_eq!(found, Some(created));

        let other_brand = mock
            .find_customer_by_email("owner@example.com", &RoutingKey::new("mailline").unwrap())
            .await
            .unwrap();
        assert_eq!(other_brand, None);
    }

    #[tokio::test]
    async fn idempotency_key_returns_same_customer() {
        let mock = MockPaymentProvider::new();
        let first = mock.create_customer(&customer_request(Some("k1"))).await.unwrap();
        let second = mock.create_customer(&customer_request(Some("k1"))).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.customer_count(), 1);
        assert_eq!(mock.call_count("create_customer"), 2);
    }

    #[tokio::test]
    async fn method_error_is_returned() {
        let mock = MockPaymentProvider::new();
        mock.set_method_error("create_customer", DomainError::external("stripe down"));

        assert!(mock.create_customer(&customer_request(None)).await.is_err());

        mock.clear_errors();
        assert!(mock.create_customer(&customer_request(None)).await.is_ok());
    }
}
