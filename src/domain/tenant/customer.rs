//! Billing customer record.
//!
//! One customer per company and routing key. Status fields are written from
//! payment processor events that may arrive late or twice, so every write is
//! guarded by the `created` timestamp of the event that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{CompanyId, CustomerId, RoutingKey, Timestamp, ValidationError};

/// Whether the company is paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Billing shell created at provisioning, no checkout yet.
    Pending,
    /// Checkout completed or latest invoice paid.
    Active,
    /// The latest invoice failed. Eligible for processor retries.
    PaymentFailed,
    /// Subscription deleted at the processor.
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Active => "active",
            PaymentStatus::PaymentFailed => "payment_failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// Orders statuses written by events created in the same second.
    fn finality(&self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Active | PaymentStatus::PaymentFailed => 1,
            PaymentStatus::Canceled => 2,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "active" => Ok(PaymentStatus::Active),
            "payment_failed" => Ok(PaymentStatus::PaymentFailed),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

/// Subscription status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Orders statuses written by events created in the same second.
    fn finality(&self) -> u8 {
        match self {
            SubscriptionStatus::Incomplete => 0,
            SubscriptionStatus::Trialing => 1,
            SubscriptionStatus::Active
            | SubscriptionStatus::PastDue
            | SubscriptionStatus::Unpaid
            | SubscriptionStatus::Paused => 2,
            SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired => 3,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "paused" => Ok(SubscriptionStatus::Paused),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

/// Price tiers offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Starter,
    Growth,
    Scale,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Starter => "starter",
            PriceTier::Growth => "growth",
            PriceTier::Scale => "scale",
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(PriceTier::Starter),
            "growth" => Ok(PriceTier::Growth),
            "scale" => Ok(PriceTier::Scale),
            other => Err(ValidationError::invalid_format(
                "price_tier",
                format!("unknown price tier '{}'", other),
            )),
        }
    }
}

/// Billing record for a company (or, for payment-first checkouts, for a
/// processor customer not yet linked to a company).
///
/// # Invariants
///
/// - `payment_status_at` / `subscription_status_at` only move forward
/// - at an equal timestamp a status only moves toward a more final one
/// - `stripe_customer_id`, once set, is never replaced by `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub company_id: Option<CompanyId>,
    pub routing_key: RoutingKey,
    pub email: Option<String>,
    pub payment_status: PaymentStatus,
    /// Event `created` (unix seconds) of the last applied payment status.
    pub payment_status_at: Option<i64>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_status_at: Option<i64>,
    pub price_tier: Option<PriceTier>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    /// Set by a failed invoice, cleared by a paid one.
    pub retry_eligible: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

impl Customer {
    /// Billing shell created during provisioning.
    pub fn shell(
        company_id: CompanyId,
        routing_key: RoutingKey,
        email: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: CustomerId::new(),
            company_id: Some(company_id),
            routing_key,
            email,
            payment_status: PaymentStatus::Pending,
            payment_status_at: None,
            subscription_status: None,
            subscription_status_at: None,
            price_tier: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            retry_eligible: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Customer known only by its processor id.
    pub fn from_processor(
        stripe_customer_id: impl Into<String>,
        company_id: Option<CompanyId>,
        routing_key: RoutingKey,
        email: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: CustomerId::new(),
            company_id,
            routing_key,
            email,
            payment_status: PaymentStatus::Pending,
            payment_status_at: None,
            subscription_status: None,
            subscription_status_at: None,
            price_tier: None,
            stripe_customer_id: Some(stripe_customer_id.into()),
            stripe_subscription_id: None,
            retry_eligible: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Records the processor customer id. An existing id is kept.
    pub fn link_processor_customer(&mut self, stripe_customer_id: &str, now: Timestamp) -> bool {
        if self.stripe_customer_id.is_some() {
            return false;
        }
        self.stripe_customer_id = Some(stripe_customer_id.to_string());
        self.updated_at = now;
        true
    }

    /// Links a payment-first customer to the company it now belongs to.
    pub fn link_company(&mut self, company_id: CompanyId, now: Timestamp) -> bool {
        if self.company_id.is_some() {
            return false;
        }
        self.company_id = Some(company_id);
        self.updated_at = now;
        true
    }

    /// Applies a payment status from an event created at `event_created`.
    ///
    /// Returns false (and changes nothing) when a newer event was already
    /// applied or the values are already in place. Within the same second a
    /// less final status never replaces a more final one.
    pub fn apply_payment_status(
        &mut self,
        status: PaymentStatus,
        event_created: i64,
        now: Timestamp,
    ) -> bool {
        match self.payment_status_at {
            Some(at) if event_created < at => return false,
            Some(at) if event_created == at
                && status.finality() < self.payment_status.finality() =>
            {
                return false
            }
            _ => {}
        }
        let before = self.clone();
        self.payment_status = status;
        self.payment_status_at = Some(event_created);
        self.retry_eligible = status == PaymentStatus::PaymentFailed;
        self.touch_if_changed(&before, now)
    }

    /// Applies a subscription snapshot from an event created at `event_created`.
    pub fn apply_subscription(
        &mut self,
        subscription_id: &str,
        status: SubscriptionStatus,
        price_tier: Option<PriceTier>,
        event_created: i64,
        now: Timestamp,
    ) -> bool {
        match (self.subscription_status_at, self.subscription_status) {
            (Some(at), _) if event_created < at => return false,
            (Some(at), Some(current))
                if event_created == at && status.finality() < current.finality() =>
            {
                return false
            }
            _ => {}
        }
        let before = self.clone();
        self.stripe_subscription_id = Some(subscription_id.to_string());
        self.subscription_status = Some(status);
        self.subscription_status_at = Some(event_created);
        if price_tier.is_some() {
            self.price_tier = price_tier;
        }
        self.touch_if_changed(&before, now)
    }

    /// Fills the email when none is on record.
    pub fn fill_email(&mut self, email: Option<&str>, now: Timestamp) -> bool {
        match (self.email.is_some(), email) {
            (false, Some(email)) => {
                self.email = Some(email.to_string());
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    fn touch_if_changed(&mut self, before: &Customer, now: Timestamp) -> bool {
        if self == before {
            return false;
        }
        self.updated_at = now;
        true
    }
}
