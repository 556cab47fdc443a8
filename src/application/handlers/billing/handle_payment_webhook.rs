//! HandlePaymentWebhookHandler - reconciles Stripe events into leads and customers.
//!
//! Stripe delivers at least once, in no particular order. Every branch reads
//! current state and only moves it forward, so replays and late arrivals are
//! no-ops. The event ledger short-circuits exact redeliveries but is not
//! needed for correctness.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::domain::billing::{
    CheckoutIdentifiers, CheckoutMetadata, CheckoutSessionObject, InvoiceObject, Lead,
    LeadStatus, LeadUpdate, PriceCatalog, StripeEvent, StripeEventType, SubscriptionObject,
    WebhookError, WebhookSignatureVerifier, KEY_ROUTING_KEY,
};
use crate::domain::foundation::{RoutingKey, Timestamp, ValidationError};
use crate::domain::tenant::{Customer, PaymentStatus, SubscriptionStatus};
use crate::ports::{
    Clock, CustomerRepository, LeadRepository, WebhookEventRecord, WebhookEventRepository,
};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header.
    pub signature: String,
}

/// Result of webhook processing. Every variant is acknowledged with 2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    Processed { event_id: String, event_type: String },
    /// Already in the ledger.
    Duplicate { event_id: String },
    /// Nothing to do for this event.
    Ignored { event_id: String, reason: String },
}

/// Handler for processing Stripe webhooks.
pub struct HandlePaymentWebhookHandler {
    verifier: WebhookSignatureVerifier,
    leads: Arc<dyn LeadRepository>,
    customers: Arc<dyn CustomerRepository>,
    ledger: Arc<dyn WebhookEventRepository>,
    catalog: PriceCatalog,
    clock: Arc<dyn Clock>,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        verifier: WebhookSignatureVerifier,
        leads: Arc<dyn LeadRepository>,
        customers: Arc<dyn CustomerRepository>,
        ledger: Arc<dyn WebhookEventRepository>,
        catalog: PriceCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            leads,
            customers,
            ledger,
            catalog,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let now = self.clock.now();

        // 1. Verify signature before anything else
        let event = self
            .verifier
            .verify_and_parse_at(&cmd.payload, &cmd.signature, now.as_unix_secs())
            .map_err(|err| {
                tracing::warn!(error = %err, "webhook rejected");
                err
            })?;

        // 2. Exact redelivery
        if self.ledger.find_by_event_id(&event.id).await?.is_some() {
            tracing::info!(event_id = %event.id, "duplicate webhook acknowledged");
            return Ok(HandlePaymentWebhookResult::Duplicate { event_id: event.id });
        }

        // 3. Dispatch; failures are not recorded so Stripe's retry runs again
        let (record, result) = match self.dispatch(&event, now).await {
            Ok(()) => (
                WebhookEventRecord::processed(&event.id, &event.event_type, payload(&event), now),
                HandlePaymentWebhookResult::Processed {
                    event_id: event.id.clone(),
                    event_type: event.event_type.clone(),
                },
            ),
            Err(WebhookError::Ignored(reason)) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "webhook ignored"
                );
                (
                    WebhookEventRecord::ignored(
                        &event.id,
                        &event.event_type,
                        reason.as_str(),
                        payload(&event),
                        now,
                    ),
                    HandlePaymentWebhookResult::Ignored {
                        event_id: event.id.clone(),
                        reason,
                    },
                )
            }
            Err(err) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    retryable = err.is_retryable(),
                    error = %err,
                    "webhook processing failed"
                );
                return Err(err);
            }
        };

        // 4. Record; a lost ledger write only costs a harmless replay
        if let Err(err) = self.ledger.save(record).await {
            tracing::warn!(event_id = %event.id, error = %err, "webhook ledger write failed");
        }
        Ok(result)
    }

    async fn dispatch(&self, event: &StripeEvent, now: Timestamp) -> Result<(), WebhookError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => self.session_completed(event, now).await,
            StripeEventType::CheckoutSessionExpired => self.session_expired(event, now).await,
            StripeEventType::CustomerSubscriptionCreated
            | StripeEventType::CustomerSubscriptionUpdated => {
                self.subscription_changed(event, false, now).await
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                self.subscription_changed(event, true, now).await
            }
            StripeEventType::InvoicePaymentFailed => {
                self.invoice(event, PaymentStatus::PaymentFailed, now).await
            }
            StripeEventType::InvoicePaid => self.invoice(event, PaymentStatus::Active, now).await,
            StripeEventType::Unknown => Err(WebhookError::Ignored(format!(
                "unhandled event type {}",
                event.event_type
            ))),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout sessions → leads
    // ════════════════════════════════════════════════════════════════════════════

    async fn session_completed(&self, event: &StripeEvent, now: Timestamp) -> Result<(), WebhookError> {
        let session: CheckoutSessionObject = object(event)?;
        let metadata = session_metadata(&session)?;
        let email = session.payer_email().map(str::to_ascii_lowercase);
        let ids = identifiers(&session);

        match self
            .find_lead(&session.id, email.as_deref(), &metadata.routing_key)
            .await?
        {
            Some(mut lead) => {
                if lead.convert(&ids, email.as_deref(), &session.metadata, now)
                    == LeadUpdate::Applied
                {
                    self.leads.update(&lead).await?;
                    tracing::info!(event_id = %event.id, lead_id = %lead.id, "lead converted");
                }
            }
            None => {
                let lead = Lead::new(
                    email.clone(),
                    metadata.routing_key.clone(),
                    LeadStatus::Converted,
                    &ids,
                    session.metadata.clone(),
                    now,
                );
                self.leads.insert(&lead).await?;
                tracing::info!(event_id = %event.id, lead_id = %lead.id, "converted lead created");
            }
        }

        match session.customer.as_deref() {
            Some(stripe_customer_id) => {
                self.activate_customer(stripe_customer_id, &metadata, email.as_deref(), event, now)
                    .await
            }
            None => {
                tracing::warn!(event_id = %event.id, "completed session has no customer");
                Ok(())
            }
        }
    }

    async fn session_expired(&self, event: &StripeEvent, now: Timestamp) -> Result<(), WebhookError> {
        let session: CheckoutSessionObject = object(event)?;
        let metadata = session_metadata(&session)?;
        let email = session.payer_email().map(str::to_ascii_lowercase);
        let ids = identifiers(&session);

        match self
            .find_lead(&session.id, email.as_deref(), &metadata.routing_key)
            .await?
        {
            Some(mut lead) => match lead.abandon(&ids, now) {
                LeadUpdate::Applied => {
                    self.leads.update(&lead).await?;
                    tracing::info!(event_id = %event.id, lead_id = %lead.id, "lead abandoned");
                }
                LeadUpdate::Superseded => {
                    tracing::info!(
                        event_id = %event.id,
                        lead_id = %lead.id,
                        "expiry after conversion, lead left converted"
                    );
                }
                LeadUpdate::Unchanged => {}
            },
            None => {
                let Some(email) = email else {
                    return Err(WebhookError::Ignored(
                        "expired session without email or lead".to_string(),
                    ));
                };
                let lead = Lead::new(
                    Some(email),
                    metadata.routing_key.clone(),
                    LeadStatus::Abandoned,
                    &ids,
                    session.metadata.clone(),
                    now,
                );
                self.leads.insert(&lead).await?;
                tracing::info!(event_id = %event.id, lead_id = %lead.id, "abandoned lead created");
            }
        }
        Ok(())
    }

    async fn find_lead(
        &self,
        session_id: &str,
        email: Option<&str>,
        routing_key: &RoutingKey,
    ) -> Result<Option<Lead>, WebhookError> {
        if let Some(lead) = self.leads.find_by_session_id(session_id).await? {
            return Ok(Some(lead));
        }
        match email {
            Some(email) => Ok(self.leads.find_by_email(email, routing_key).await?),
            None => Ok(None),
        }
    }

    /// Upserts the paying customer: by metadata company first, then by
    /// processor id.
    async fn activate_customer(
        &self,
        stripe_customer_id: &str,
        metadata: &CheckoutMetadata,
        email: Option<&str>,
        event: &StripeEvent,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let existing = match metadata.company_id {
            Some(company_id) => {
                self.customers
                    .find_by_company(&company_id, &metadata.routing_key)
                    .await?
            }
            None => None,
        };
        let existing = match existing {
            Some(customer) => Some(customer),
            None => {
                self.customers
                    .find_by_stripe_customer_id(stripe_customer_id)
                    .await?
            }
        };

        match existing {
            Some(mut customer) => {
                let mut changed = customer.link_processor_customer(stripe_customer_id, now);
                if let Some(company_id) = metadata.company_id {
                    changed |= customer.link_company(company_id, now);
                }
                changed |= customer.fill_email(email, now);
                changed |= customer.apply_payment_status(PaymentStatus::Active, event.created, now);
                if changed {
                    self.customers.update(&customer).await?;
                    tracing::info!(event_id = %event.id, customer_id = %customer.id, "customer activated");
                }
            }
            None => {
                let mut customer = Customer::from_processor(
                    stripe_customer_id,
                    metadata.company_id,
                    metadata.routing_key.clone(),
                    email.map(str::to_string),
                    now,
                );
                customer.apply_payment_status(PaymentStatus::Active, event.created, now);
                self.customers.insert(&customer).await?;
                tracing::info!(event_id = %event.id, customer_id = %customer.id, "customer created from checkout");
            }
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscriptions and invoices → customer status
    // ════════════════════════════════════════════════════════════════════════════

    async fn subscription_changed(
        &self,
        event: &StripeEvent,
        deleted: bool,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = object(event)?;
        let status: SubscriptionStatus = subscription
            .status
            .parse()
            .map_err(|err: ValidationError| WebhookError::ParseError(err.to_string()))?;
        let tier = subscription
            .first_price_id()
            .and_then(|price_id| self.catalog.tier_for_price(price_id));

        let mut customer = self
            .billed_customer(&subscription.customer, Some(&subscription.metadata))
            .await?;

        let mut changed = customer.link_processor_customer(&subscription.customer, now);
        changed |= customer.apply_subscription(&subscription.id, status, tier, event.created, now);
        if deleted {
            changed |= customer.apply_payment_status(PaymentStatus::Canceled, event.created, now);
        }
        self.save_if_changed(&customer, changed, event).await
    }

    async fn invoice(
        &self,
        event: &StripeEvent,
        status: PaymentStatus,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let invoice: InvoiceObject = object(event)?;
        let mut customer = self
            .billed_customer(&invoice.customer, invoice.subscription_metadata())
            .await?;

        let mut changed = customer.link_processor_customer(&invoice.customer, now);
        changed |= customer.apply_payment_status(status, event.created, now);
        self.save_if_changed(&customer, changed, event).await
    }

    /// Finds the customer by processor id, then by metadata company.
    ///
    /// A miss is retryable: the checkout that creates the customer may not
    /// have been delivered yet.
    async fn billed_customer(
        &self,
        stripe_customer_id: &str,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<Customer, WebhookError> {
        if let Some(customer) = self
            .customers
            .find_by_stripe_customer_id(stripe_customer_id)
            .await?
        {
            return Ok(customer);
        }

        let by_company = metadata
            .and_then(|map| CheckoutMetadata::from_map(map).ok())
            .and_then(|meta| meta.company_id.map(|id| (id, meta.routing_key)));
        if let Some((company_id, routing_key)) = by_company {
            if let Some(customer) = self
                .customers
                .find_by_company(&company_id, &routing_key)
                .await?
            {
                return Ok(customer);
            }
        }

        Err(WebhookError::CustomerNotFound(stripe_customer_id.to_string()))
    }

    async fn save_if_changed(
        &self,
        customer: &Customer,
        changed: bool,
        event: &StripeEvent,
    ) -> Result<(), WebhookError> {
        if !changed {
            tracing::info!(
                event_id = %event.id,
                customer_id = %customer.id,
                "stale or repeated event, customer unchanged"
            );
            return Ok(());
        }
        self.customers.update(customer).await?;
        tracing::info!(
            event_id = %event.id,
            customer_id = %customer.id,
            payment_status = %customer.payment_status,
            "customer billing state updated"
        );
        Ok(())
    }
}

fn object<T: DeserializeOwned>(event: &StripeEvent) -> Result<T, WebhookError> {
    event
        .deserialize_object()
        .map_err(|err| WebhookError::ParseError(err.to_string()))
}

/// Sessions opened outside this service carry no routing metadata.
fn session_metadata(session: &CheckoutSessionObject) -> Result<CheckoutMetadata, WebhookError> {
    if !session.metadata.contains_key(KEY_ROUTING_KEY) {
        return Err(WebhookError::Ignored(format!(
            "session {} has no routing metadata",
            session.id
        )));
    }
    Ok(CheckoutMetadata::from_map(&session.metadata)?)
}

fn identifiers(session: &CheckoutSessionObject) -> CheckoutIdentifiers {
    CheckoutIdentifiers {
        checkout_session_id: session.id.clone(),
        stripe_customer_id: session.customer.clone(),
        subscription_id: session.subscription.clone(),
    }
}

fn payload(event: &StripeEvent) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}
