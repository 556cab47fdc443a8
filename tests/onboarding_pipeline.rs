//! End-to-end tests for the onboarding pipeline.
//!
//! Every stage runs against the in-memory adapters:
//! 1. Signup and code verification
//! 2. Tenant provisioning and repair
//! 3. Checkout in both modes
//! 4. Signed Stripe webhooks, including redelivery and out-of-order events

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use onboarding_pipeline::adapters::http::{OnboardingAppState, OnboardingSettings};
use onboarding_pipeline::adapters::memory::{
    InMemoryIdentityProvider, InMemoryStore, ManualClock, RecordingMessageChannel, StoreOperation,
};
use onboarding_pipeline::adapters::stripe::MockPaymentProvider;
use onboarding_pipeline::application::handlers::{
    CheckoutSettings, CreateCheckoutCommand, CreateCheckoutResult, CreateSignupCommand,
    HandlePaymentWebhookCommand, HandlePaymentWebhookResult, ProvisionAccountCommand,
    ProvisionAccountResult, RepairTenantsCommand, RepairTenantsHandler, VerifyCodeCommand,
};
use onboarding_pipeline::domain::billing::{
    sign_payload, CheckoutMode, LeadStatus, PriceCatalog, WebhookError, WebhookSignatureVerifier,
};
use onboarding_pipeline::domain::foundation::Timestamp;
use onboarding_pipeline::domain::signup::{SignupPolicy, SignupState};
use onboarding_pipeline::domain::tenant::{PaymentStatus, PriceTier, SubscriptionStatus};
use onboarding_pipeline::ports::Clock;

const SECRET: &str = "whsec_pipeline_secret";
const NOW: i64 = 1_700_000_000;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Pipeline {
    state: OnboardingAppState,
    store: Arc<InMemoryStore>,
    channel: Arc<RecordingMessageChannel>,
    payments: Arc<MockPaymentProvider>,
    clock: Arc<ManualClock>,
}

impl Pipeline {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingMessageChannel::new());
        let payments = Arc::new(MockPaymentProvider::new());
        let clock = Arc::new(ManualClock::at(Timestamp::from_unix_secs(NOW)));

        let catalog = PriceCatalog::new()
            .with_price(PriceTier::Starter, "price_starter")
            .with_price(PriceTier::Growth, "price_growth")
            .with_price(PriceTier::Scale, "price_scale");

        let state = OnboardingAppState {
            signup_repository: store.clone(),
            tenant_repository: store.clone(),
            customer_repository: store.clone(),
            lead_repository: store.clone(),
            webhook_event_repository: store.clone(),
            message_channel: channel.clone(),
            identity_provider: Arc::new(InMemoryIdentityProvider::new()),
            payment_provider: payments.clone(),
            clock: clock.clone(),
            settings: Arc::new(OnboardingSettings {
                signup_policy: SignupPolicy::default(),
                provisioning_step_timeout: Duration::from_secs(5),
                checkout: CheckoutSettings {
                    catalog,
                    success_url: "https://app.example.com/welcome".to_string(),
                    cancel_url: "https://app.example.com/pricing".to_string(),
                },
                webhook_verifier: WebhookSignatureVerifier::new(SECRET),
            }),
        };

        Self {
            state,
            store,
            channel,
            payments,
            clock,
        }
    }

    /// Signs up, verifies and provisions one tenant.
    async fn onboard(&self, contact: &str) -> ProvisionAccountResult {
        let signup = self
            .state
            .create_signup_handler()
            .handle(CreateSignupCommand {
                display_name: "Dana Ruiz".to_string(),
                company_name: Some("Ruiz Bakery".to_string()),
                contact: contact.to_string(),
                email: None,
                routing_key: "textline".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(signup.state, SignupState::CodeSent);

        let code = self.channel.last_code().unwrap();
        self.state
            .verify_code_handler()
            .handle(VerifyCodeCommand {
                signup_id: signup.signup_id,
                code,
            })
            .await
            .unwrap();

        self.state
            .provision_account_handler()
            .handle(ProvisionAccountCommand {
                signup_id: signup.signup_id,
            })
            .await
            .unwrap()
    }

    async fn checkout(&self, email: Option<&str>, company_id: Option<String>) -> CreateCheckoutResult {
        self.state
            .create_checkout_handler()
            .handle(CreateCheckoutCommand {
                routing_key: "textline".to_string(),
                price_tier: "growth".to_string(),
                email: email.map(str::to_string),
                user_id: None,
                company_id,
                reference: None,
                success_url: None,
                cancel_url: None,
            })
            .await
            .unwrap()
    }

    async fn deliver(
        &self,
        id: &str,
        kind: &str,
        created: i64,
        object: Value,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let payload = json!({
            "id": id,
            "object": "event",
            "type": kind,
            "created": created,
            "livemode": false,
            "data": { "object": object }
        })
        .to_string();
        let signed_at = self.clock_now();

        self.state
            .webhook_handler()
            .handle(HandlePaymentWebhookCommand {
                signature: sign_payload(SECRET, signed_at, &payload),
                payload: payload.into_bytes(),
            })
            .await
    }

    fn clock_now(&self) -> i64 {
        self.clock.now().as_unix_secs()
    }
}

fn session_object(
    session_id: &str,
    customer: Option<&str>,
    email: Option<&str>,
    metadata: Value,
) -> Value {
    json!({
        "id": session_id,
        "object": "checkout.session",
        "customer": customer,
        "customer_details": { "email": email },
        "subscription": "sub_1",
        "metadata": metadata
    })
}

fn subscription_object(customer: &str, status: &str, metadata: Value) -> Value {
    json!({
        "id": "sub_1",
        "object": "subscription",
        "customer": customer,
        "status": status,
        "metadata": metadata,
        "items": { "data": [ { "price": { "id": "price_growth" } } ] }
    })
}

fn invoice_object(id: &str, customer: &str) -> Value {
    json!({
        "id": id,
        "object": "invoice",
        "customer": customer,
        "subscription": "sub_1"
    })
}

// =============================================================================
// Identified flow
// =============================================================================

#[tokio::test]
async fn verified_signup_becomes_paying_customer() {
    let pipeline = Pipeline::new();

    let provisioned = pipeline.onboard("dana@ruizbakery.test").await;
    assert!(provisioned.created);
    assert!(provisioned.bundle.is_complete());
    let shell = provisioned.bundle.customer.clone().unwrap();
    assert_eq!(shell.payment_status, PaymentStatus::Pending);

    let company_id = provisioned.bundle.company.id;
    let checkout = pipeline
        .checkout(Some("dana@ruizbakery.test"), Some(company_id.to_string()))
        .await;
    assert_eq!(checkout.mode, CheckoutMode::Identified);
    let stripe_customer_id = checkout.stripe_customer_id.clone().unwrap();

    // The provisioning shell is linked, not duplicated.
    let customers = pipeline.store.all_customers().await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].id, shell.id);
    assert_eq!(
        customers[0].stripe_customer_id.as_deref(),
        Some(stripe_customer_id.as_str())
    );

    let sessions = pipeline.payments.sessions();
    assert_eq!(sessions.len(), 1);
    let metadata = sessions[0].metadata.clone();
    assert_eq!(metadata.get("customer_type").map(String::as_str), Some("onboarding"));
    assert_eq!(
        metadata.get("company_id").cloned(),
        Some(company_id.to_string())
    );

    let outcome = pipeline
        .deliver(
            "evt_completed",
            "checkout.session.completed",
            NOW - 100,
            session_object(
                &checkout.session_id,
                Some(&stripe_customer_id),
                Some("dana@ruizbakery.test"),
                json!(metadata),
            ),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, HandlePaymentWebhookResult::Processed { .. }));

    let subscribed = pipeline
        .deliver(
            "evt_sub",
            "customer.subscription.created",
            NOW - 90,
            subscription_object(&stripe_customer_id, "active", json!(metadata)),
        )
        .await
        .unwrap();
    assert!(matches!(subscribed, HandlePaymentWebhookResult::Processed { .. }));

    let customers = pipeline.store.all_customers().await;
    assert_eq!(customers.len(), 1);
    let customer = &customers[0];
    assert_eq!(customer.payment_status, PaymentStatus::Active);
    assert_eq!(customer.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(customer.price_tier, Some(PriceTier::Growth));
    assert_eq!(customer.company_id, Some(company_id));

    let leads = pipeline.store.all_leads().await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].status, LeadStatus::Converted);
    assert_eq!(pipeline.store.webhook_event_count().await, 2);
}

#[tokio::test]
async fn reprovisioning_returns_existing_tenant() {
    let pipeline = Pipeline::new();
    let first = pipeline.onboard("+15551234567").await;

    let again = pipeline
        .state
        .provision_account_handler()
        .handle(ProvisionAccountCommand {
            signup_id: first.bundle.company.signup_request_id,
        })
        .await
        .unwrap();

    assert!(!again.created);
    assert_eq!(again.bundle.company.id, first.bundle.company.id);
    assert_eq!(pipeline.store.all_companies().await.len(), 1);
    assert_eq!(pipeline.store.all_profiles().await.len(), 1);
}

#[tokio::test]
async fn repair_completes_tenant_after_enrichment_failure() {
    let pipeline = Pipeline::new();
    pipeline.store.fail(StoreOperation::InsertMembership).await;

    let provisioned = pipeline.onboard("dana@ruizbakery.test").await;
    assert!(provisioned.created);
    assert!(provisioned.bundle.membership.is_none());
    assert!(!provisioned.bundle.is_complete());

    pipeline.store.recover(StoreOperation::InsertMembership).await;
    let repair = RepairTenantsHandler::new(
        pipeline.state.tenant_repository.clone(),
        pipeline.state.tenant_enricher(),
    );
    let result = repair
        .handle(RepairTenantsCommand {
            limit: 10,
            after: None,
        })
        .await
        .unwrap();

    assert_eq!(result.repaired, 1);
    assert_eq!(result.still_incomplete, 0);
    assert_eq!(pipeline.store.all_memberships().await.len(), 1);
}

// =============================================================================
// Payment-first flow
// =============================================================================

#[tokio::test]
async fn payment_first_checkout_creates_customer_from_webhook() {
    let pipeline = Pipeline::new();

    let checkout = pipeline.checkout(None, None).await;
    assert_eq!(checkout.mode, CheckoutMode::PaymentFirst);
    assert!(checkout.stripe_customer_id.is_none());
    assert!(pipeline.store.all_customers().await.is_empty());
    assert_eq!(pipeline.payments.call_count("create_customer"), 0);

    let metadata = pipeline.payments.sessions()[0].metadata.clone();
    assert_eq!(metadata.get("customer_type").map(String::as_str), Some("marketing"));

    pipeline
        .deliver(
            "evt_completed",
            "checkout.session.completed",
            NOW - 10,
            session_object(
                &checkout.session_id,
                Some("cus_funnel"),
                Some("Buyer@Example.com"),
                json!(metadata),
            ),
        )
        .await
        .unwrap();

    let leads = pipeline.store.all_leads().await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].status, LeadStatus::Converted);
    assert_eq!(leads[0].email.as_deref(), Some("buyer@example.com"));

    let customers = pipeline.store.all_customers().await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].stripe_customer_id.as_deref(), Some("cus_funnel"));
    assert_eq!(customers[0].payment_status, PaymentStatus::Active);
    assert!(customers[0].company_id.is_none());
}

// =============================================================================
// Webhook delivery semantics
// =============================================================================

#[tokio::test]
async fn stale_invoice_does_not_override_newer_failure() {
    let pipeline = Pipeline::new();
    let checkout = pipeline.checkout(None, None).await;
    let metadata = pipeline.payments.sessions()[0].metadata.clone();

    pipeline
        .deliver(
            "evt_completed",
            "checkout.session.completed",
            NOW - 300,
            session_object(&checkout.session_id, Some("cus_9"), Some("a@b.test"), json!(metadata)),
        )
        .await
        .unwrap();

    pipeline
        .deliver("evt_failed", "invoice.payment_failed", NOW - 50, invoice_object("in_2", "cus_9"))
        .await
        .unwrap();

    // Delivered late, created before the failure.
    let stale = pipeline
        .deliver("evt_paid_old", "invoice.paid", NOW - 80, invoice_object("in_1", "cus_9"))
        .await
        .unwrap();
    assert!(matches!(stale, HandlePaymentWebhookResult::Processed { .. }));

    let customer = pipeline.store.all_customers().await.remove(0);
    assert_eq!(customer.payment_status, PaymentStatus::PaymentFailed);
    assert!(customer.retry_eligible);

    pipeline
        .deliver("evt_paid_new", "invoice.paid", NOW - 20, invoice_object("in_3", "cus_9"))
        .await
        .unwrap();
    let customer = pipeline.store.all_customers().await.remove(0);
    assert_eq!(customer.payment_status, PaymentStatus::Active);
    assert!(!customer.retry_eligible);
}

#[tokio::test]
async fn same_second_events_delivered_backwards_keep_final_status() {
    let pipeline = Pipeline::new();
    let checkout = pipeline.checkout(None, None).await;
    let metadata = pipeline.payments.sessions()[0].metadata.clone();

    pipeline
        .deliver(
            "evt_completed",
            "checkout.session.completed",
            NOW - 100,
            session_object(&checkout.session_id, Some("cus_7"), Some("a@b.test"), json!(metadata)),
        )
        .await
        .unwrap();

    // Stripe stamps both events with the same second and delivers the
    // later one first.
    pipeline
        .deliver(
            "evt_sub_updated",
            "customer.subscription.updated",
            NOW - 10,
            subscription_object("cus_7", "active", json!({})),
        )
        .await
        .unwrap();
    pipeline
        .deliver(
            "evt_sub_created",
            "customer.subscription.created",
            NOW - 10,
            subscription_object("cus_7", "incomplete", json!({})),
        )
        .await
        .unwrap();

    let customer = pipeline.store.all_customers().await.remove(0);
    assert_eq!(customer.subscription_status, Some(SubscriptionStatus::Active));
}

#[tokio::test]
async fn redelivered_event_is_acknowledged_once() {
    let pipeline = Pipeline::new();
    let checkout = pipeline.checkout(None, None).await;
    let metadata = pipeline.payments.sessions()[0].metadata.clone();
    let object = session_object(&checkout.session_id, Some("cus_7"), Some("a@b.test"), json!(metadata));

    let first = pipeline
        .deliver("evt_once", "checkout.session.completed", NOW - 5, object.clone())
        .await
        .unwrap();
    let second = pipeline
        .deliver("evt_once", "checkout.session.completed", NOW - 5, object)
        .await
        .unwrap();

    assert!(matches!(first, HandlePaymentWebhookResult::Processed { .. }));
    assert_eq!(
        second,
        HandlePaymentWebhookResult::Duplicate {
            event_id: "evt_once".to_string()
        }
    );
    assert_eq!(pipeline.store.all_leads().await.len(), 1);
    assert_eq!(pipeline.store.all_customers().await.len(), 1);
    assert_eq!(pipeline.store.webhook_event_count().await, 1);
}

#[tokio::test]
async fn subscription_before_checkout_succeeds_on_retry() {
    let pipeline = Pipeline::new();
    let checkout = pipeline.checkout(None, None).await;
    let metadata = pipeline.payments.sessions()[0].metadata.clone();
    let subscription = subscription_object("cus_early", "active", json!(metadata));

    let early = pipeline
        .deliver("evt_sub", "customer.subscription.created", NOW - 30, subscription.clone())
        .await
        .unwrap_err();
    assert!(matches!(early, WebhookError::CustomerNotFound(_)));
    assert!(early.is_retryable());
    assert_eq!(pipeline.store.webhook_event_count().await, 0);

    pipeline
        .deliver(
            "evt_completed",
            "checkout.session.completed",
            NOW - 40,
            session_object(&checkout.session_id, Some("cus_early"), Some("a@b.test"), json!(metadata)),
        )
        .await
        .unwrap();

    // Stripe retries the failed delivery with the same event id.
    pipeline.clock.advance_secs(60);
    let retried = pipeline
        .deliver("evt_sub", "customer.subscription.created", NOW - 30, subscription)
        .await
        .unwrap();
    assert!(matches!(retried, HandlePaymentWebhookResult::Processed { .. }));

    let customer = pipeline.store.all_customers().await.remove(0);
    assert_eq!(customer.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(customer.stripe_subscription_id.as_deref(), Some("sub_1"));
}

#[tokio::test]
async fn foreign_session_is_ignored_and_recorded() {
    let pipeline = Pipeline::new();

    let outcome = pipeline
        .deliver(
            "evt_foreign",
            "checkout.session.completed",
            NOW - 5,
            session_object("cs_elsewhere", Some("cus_x"), Some("x@y.test"), json!({})),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, HandlePaymentWebhookResult::Ignored { .. }));
    assert!(pipeline.store.all_leads().await.is_empty());
    assert_eq!(pipeline.store.webhook_event_count().await, 1);
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let pipeline = Pipeline::new();
    let payload = json!({
        "id": "evt_forged",
        "type": "invoice.paid",
        "created": NOW,
        "data": { "object": invoice_object("in_1", "cus_1") }
    })
    .to_string();
    let signature = sign_payload(SECRET, NOW, &payload);
    let forged = payload.replace("cus_1", "cus_2");

    let err = pipeline
        .state
        .webhook_handler()
        .handle(HandlePaymentWebhookCommand {
            payload: forged.into_bytes(),
            signature,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature));
    assert_eq!(pipeline.store.webhook_event_count().await, 0);
}
