//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API using
//! form-encoded requests and basic auth with the secret key.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::billing::KEY_ROUTING_KEY;
use crate::domain::foundation::{DomainError, RoutingKey};
use crate::ports::{
    CheckoutHandle, CheckoutSessionRequest, CreateCustomerRequest, PaymentProvider,
    ProcessorCustomer,
};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl From<StripeCustomer> for ProcessorCustomer {
    fn from(customer: StripeCustomer) -> Self {
        let routing_key = customer.metadata.get(KEY_ROUTING_KEY).cloned();
        ProcessorCustomer {
            id: customer.id,
            email: customer.email,
            routing_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn read<T: DeserializeOwned>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T, DomainError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error_text,
                "Stripe request failed"
            );
            return Err(DomainError::external(format!(
                "Stripe {} failed with {}: {}",
                operation, status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            DomainError::external(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn network_error(e: reqwest::Error) -> DomainError {
    DomainError::external(format!("Stripe unreachable: {}", e))
}

fn push_metadata(params: &mut Vec<(String, String)>, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn checkout_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    match (&request.customer_id, &request.customer_email) {
        (Some(customer_id), _) => params.push(("customer".to_string(), customer_id.clone())),
        (None, Some(email)) => params.push(("customer_email".to_string(), email.clone())),
        (None, None) => {}
    }

    if let Some(reference) = &request.client_reference_id {
        params.push(("client_reference_id".to_string(), reference.clone()));
    }

    push_metadata(&mut params, &request.metadata);
    // Subscription events carry their own metadata copy.
    for (key, value) in &request.metadata {
        params.push((
            format!("subscription_data[metadata][{}]", key),
            value.clone(),
        ));
    }
    params
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn find_customer_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<ProcessorCustomer>, DomainError> {
        let response = self
            .http_client
            .get(self.url("/v1/customers"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(&[("email", email), ("limit", "100")])
            .send()
            .await
            .map_err(network_error)?;

        let list: StripeList<StripeCustomer> = Self::read("customer lookup", response).await?;
        Ok(brand_customer(list.data, routing_key))
    }

    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<ProcessorCustomer, DomainError> {
        let mut params = vec![("email".to_string(), request.email.clone())];
        if let Some(name) = &request.name {
            params.push(("name".to_string(), name.clone()));
        }
        push_metadata(&mut params, &request.metadata);

        let mut builder = self
            .http_client
            .post(self.url("/v1/customers"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder.send().await.map_err(network_error)?;
        let customer: StripeCustomer = Self::read("create_customer", response).await?;

        tracing::info!(stripe_customer_id = %customer.id, "Stripe customer created");
        let mut customer = ProcessorCustomer::from(customer);
        customer.email = customer.email.or_else(|| Some(request.email.clone()));
        if customer.routing_key.is_none() {
            customer.routing_key = request.metadata.get(KEY_ROUTING_KEY).cloned();
        }
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutHandle, DomainError> {
        let mut builder = self
            .http_client
            .post(self.url("/v1/checkout/sessions"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&checkout_params(request));
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder.send().await.map_err(network_error)?;
        let session: StripeCheckoutSession =
            Self::read("create_checkout_session", response).await?;

        let url = session
            .url
            .unwrap_or_else(|| format!("https://checkout.stripe.com/c/pay/{}", &session.id));
        Ok(CheckoutHandle {
            session_id: session.id,
            url,
        })
    }
}

/// Picks the payer created for this routing key. Stripe lists newest first.
fn brand_customer(
    customers: Vec<StripeCustomer>,
    routing_key: &RoutingKey,
) -> Option<ProcessorCustomer> {
    customers
        .into_iter()
        .map(ProcessorCustomer::from)
        .find(|c| c.routing_key.as_deref() == Some(routing_key.as_str()))
}
