//! CreateCheckoutHandler - opens a Stripe checkout session.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::domain::billing::{CheckoutError, CheckoutMetadata, CheckoutMode, CustomerType, PriceCatalog};
use crate::domain::foundation::{parse_email, CompanyId, RoutingKey, UserId};
use crate::domain::tenant::{Customer, PriceTier};
use crate::ports::{
    CheckoutSessionRequest, Clock, CreateCustomerRequest, CustomerRepository, PaymentProvider,
    TenantRepository,
};

/// Where Stripe sends the payer afterwards, unless the command overrides it.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub catalog: PriceCatalog,
    pub success_url: String,
    pub cancel_url: String,
}

/// Command to open a checkout session.
#[derive(Debug, Clone, Default)]
pub struct CreateCheckoutCommand {
    pub routing_key: String,
    pub price_tier: String,
    /// Known payer email. Absent means payment-first mode.
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub company_id: Option<String>,
    /// Caller reference, echoed as the session's client reference id.
    pub reference: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutResult {
    pub session_id: String,
    pub url: String,
    pub mode: CheckoutMode,
    /// Processor customer the session is bound to (identified mode only).
    pub stripe_customer_id: Option<String>,
}

/// Handler for checkout creation.
///
/// Identified mode reuses or creates the processor customer and keeps a local
/// `Customer` row in step. Payment-first mode writes nothing locally; the
/// webhook reconciler creates the records once Stripe reports the payer.
pub struct CreateCheckoutHandler {
    payments: Arc<dyn PaymentProvider>,
    customers: Arc<dyn CustomerRepository>,
    tenants: Arc<dyn TenantRepository>,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,
}

impl CreateCheckoutHandler {
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        customers: Arc<dyn CustomerRepository>,
        tenants: Arc<dyn TenantRepository>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            payments,
            customers,
            tenants,
            clock,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutCommand,
    ) -> Result<CreateCheckoutResult, CheckoutError> {
        let routing_key = RoutingKey::new(cmd.routing_key.as_str())?;
        let tier: PriceTier = cmd.price_tier.parse()?;
        let price_id = self
            .settings
            .catalog
            .price_id(tier)
            .ok_or_else(|| CheckoutError::PriceNotConfigured(tier.to_string()))?
            .to_string();

        let email = non_blank(cmd.email.as_deref())
            .map(|raw| parse_email(raw, "email"))
            .transpose()?;
        let user_id = non_blank(cmd.user_id.as_deref())
            .map(UserId::new)
            .transpose()?;
        let company_id = match non_blank(cmd.company_id.as_deref()) {
            Some(raw) => Some(self.known_company(raw, &routing_key).await?),
            None => None,
        };

        let metadata = CheckoutMetadata {
            customer_type: if user_id.is_some() || company_id.is_some() {
                CustomerType::Onboarding
            } else {
                CustomerType::Marketing
            },
            user_id,
            company_id,
            routing_key,
            reference: non_blank(cmd.reference.as_deref()).map(str::to_string),
        };
        let metadata_map = metadata.to_map();

        let (mode, stripe_customer_id) = match &email {
            Some(email) => {
                let customer = self.identified_customer(&metadata, email).await?;
                (CheckoutMode::Identified, customer.stripe_customer_id)
            }
            None => (CheckoutMode::PaymentFirst, None),
        };

        let mut request = CheckoutSessionRequest {
            customer_id: stripe_customer_id.clone(),
            customer_email: None,
            price_id,
            success_url: non_blank(cmd.success_url.as_deref())
                .unwrap_or(&self.settings.success_url)
                .to_string(),
            cancel_url: non_blank(cmd.cancel_url.as_deref())
                .unwrap_or(&self.settings.cancel_url)
                .to_string(),
            client_reference_id: metadata
                .reference
                .clone()
                .or_else(|| metadata.company_id.map(|id| id.to_string())),
            metadata: metadata_map,
            idempotency_key: None,
        };
        request.idempotency_key = session_idempotency_key(&request, &metadata);
        let handle = self.payments.create_checkout_session(&request).await?;

        tracing::info!(
            session_id = %handle.session_id,
            mode = mode.as_str(),
            routing_key = %metadata.routing_key,
            tier = %tier,
            "checkout session opened"
        );

        Ok(CreateCheckoutResult {
            session_id: handle.session_id,
            url: handle.url,
            mode,
            stripe_customer_id,
        })
    }

    async fn known_company(
        &self,
        raw: &str,
        routing_key: &RoutingKey,
    ) -> Result<CompanyId, CheckoutError> {
        let company_id: CompanyId = raw
            .parse()
            .map_err(|_| CheckoutError::validation("company_id", "not a UUID"))?;
        match self.tenants.find_company(&company_id).await? {
            Some(company) if &company.routing_key == routing_key => Ok(company_id),
            _ => Err(CheckoutError::validation(
                "company_id",
                format!("no company {} for routing key {}", company_id, routing_key),
            )),
        }
    }

    /// Finds or creates the processor customer and the local row for it.
    async fn identified_customer(
        &self,
        metadata: &CheckoutMetadata,
        email: &str,
    ) -> Result<Customer, CheckoutError> {
        let now = self.clock.now();
        let local = match metadata.company_id {
            Some(company_id) => {
                self.customers
                    .find_by_company(&company_id, &metadata.routing_key)
                    .await?
            }
            None => None,
        };

        let stripe_id = match local.as_ref().and_then(|c| c.stripe_customer_id.clone()) {
            Some(id) => id,
            None => self.processor_customer_id(metadata, email).await?,
        };

        let local = match local {
            Some(customer) => Some(customer),
            None => self.customers.find_by_stripe_customer_id(&stripe_id).await?,
        };

        match local {
            Some(mut customer) => {
                let mut changed = customer.link_processor_customer(&stripe_id, now);
                if let Some(company_id) = metadata.company_id {
                    changed |= customer.link_company(company_id, now);
                }
                changed |= customer.fill_email(Some(email), now);
                if changed {
                    self.customers.update(&customer).await?;
                }
                Ok(customer)
            }
            None => {
                let customer = Customer::from_processor(
                    stripe_id.as_str(),
                    metadata.company_id,
                    metadata.routing_key.clone(),
                    Some(email.to_string()),
                    now,
                );
                match self.customers.insert(&customer).await {
                    Ok(()) => Ok(customer),
                    Err(err) if err.is_unique_violation() => self
                        .customers
                        .find_by_stripe_customer_id(&stripe_id)
                        .await?
                        .ok_or_else(|| CheckoutError::Upstream(err.to_string())),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn processor_customer_id(
        &self,
        metadata: &CheckoutMetadata,
        email: &str,
    ) -> Result<String, CheckoutError> {
        if let Some(existing) = self
            .payments
            .find_customer_by_email(email, &metadata.routing_key)
            .await?
        {
            return Ok(existing.id);
        }
        let created = self
            .payments
            .create_customer(&CreateCustomerRequest {
                email: email.to_string(),
                name: None,
                metadata: metadata.to_map(),
                idempotency_key: Some(format!("customer-{}-{}", metadata.routing_key, email)),
            })
            .await?;
        tracing::info!(stripe_customer_id = %created.id, "processor customer created");
        Ok(created.id)
    }
}

/// Repeating a checkout for the same company or reference with the same
/// parameters returns the session already opened. Anonymous checkouts get no
/// key, since two buyers may send identical requests.
fn session_idempotency_key(
    request: &CheckoutSessionRequest,
    metadata: &CheckoutMetadata,
) -> Option<String> {
    let subject = metadata
        .company_id
        .map(|id| id.to_string())
        .or_else(|| metadata.reference.clone())?;

    let mut hasher = Sha256::new();
    for part in [
        request.customer_id.as_deref().unwrap_or_default(),
        request.price_id.as_str(),
        request.success_url.as_str(),
        request.cancel_url.as_str(),
        request.client_reference_id.as_deref().unwrap_or_default(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    for (key, value) in &request.metadata {
        hasher.update(key.as_bytes());
        hasher.update([b'=']);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    Some(format!(
        "checkout-{}-{}-{}",
        metadata.routing_key,
        subject,
        &digest[..16]
    ))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
