//! Lead aggregate - a checkout attempt seen through processor events.
//!
//! Leads are keyed by checkout session id and by (email, routing key). They
//! only ever move toward `Converted`; once converted nothing downgrades them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{LeadId, RoutingKey, StateMachine, Timestamp, ValidationError};

/// Lead lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// The checkout session expired unpaid.
    Abandoned,
    /// The checkout session completed.
    Converted,
}

impl LeadStatus {
    /// Finality rank. A write may never lower it.
    pub fn rank(&self) -> u8 {
        match self {
            LeadStatus::Abandoned => 0,
            LeadStatus::Converted => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Abandoned => "abandoned",
            LeadStatus::Converted => "converted",
        }
    }
}

impl StateMachine for LeadStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        target.rank() >= self.rank()
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            LeadStatus::Abandoned => vec![LeadStatus::Abandoned, LeadStatus::Converted],
            LeadStatus::Converted => vec![LeadStatus::Converted],
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abandoned" => Ok(LeadStatus::Abandoned),
            "converted" => Ok(LeadStatus::Converted),
            other => Err(ValidationError::invalid_format(
                "lead_status",
                format!("unknown lead status '{}'", other),
            )),
        }
    }
}

/// Processor identifiers observed on a checkout event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutIdentifiers {
    pub checkout_session_id: String,
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

/// Outcome of applying an event to a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadUpdate {
    /// Status or identifiers changed.
    Applied,
    /// The event carried nothing new.
    Unchanged,
    /// The lead already holds a more final status.
    Superseded,
}

/// Lead aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub email: Option<String>,
    pub routing_key: RoutingKey,
    pub status: LeadStatus,
    pub needs_followup: bool,
    pub checkout_session_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

impl Lead {
    /// New lead in `status` for a checkout session.
    pub fn new(
        email: Option<String>,
        routing_key: RoutingKey,
        status: LeadStatus,
        ids: &CheckoutIdentifiers,
        metadata: BTreeMap<String, String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: LeadId::new(),
            email,
            routing_key,
            status,
            needs_followup: status == LeadStatus::Abandoned,
            checkout_session_id: Some(ids.checkout_session_id.clone()),
            stripe_customer_id: ids.stripe_customer_id.clone(),
            subscription_id: ids.subscription_id.clone(),
            metadata,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Marks the lead converted and records the processor identifiers.
    ///
    /// Re-applying the same completion rewrites the same values.
    pub fn convert(
        &mut self,
        ids: &CheckoutIdentifiers,
        email: Option<&str>,
        metadata: &BTreeMap<String, String>,
        now: Timestamp,
    ) -> LeadUpdate {
        let before = self.clone();
        self.status = LeadStatus::Converted;
        self.needs_followup = false;
        self.checkout_session_id = Some(ids.checkout_session_id.clone());
        if ids.stripe_customer_id.is_some() {
            self.stripe_customer_id = ids.stripe_customer_id.clone();
        }
        if ids.subscription_id.is_some() {
            self.subscription_id = ids.subscription_id.clone();
        }
        if self.email.is_none() {
            self.email = email.map(str::to_string);
        }
        for (key, value) in metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
        self.touch_if_changed(&before, now)
    }

    /// Marks the lead abandoned for follow-up, unless it already converted.
    pub fn abandon(&mut self, ids: &CheckoutIdentifiers, now: Timestamp) -> LeadUpdate {
        if !self.status.can_transition_to(&LeadStatus::Abandoned) {
            return LeadUpdate::Superseded;
        }
        let before = self.clone();
        self.status = LeadStatus::Abandoned;
        self.needs_followup = true;
        if self.checkout_session_id.is_none() {
            self.checkout_session_id = Some(ids.checkout_session_id.clone());
        }
        if self.stripe_customer_id.is_none() {
            self.stripe_customer_id = ids.stripe_customer_id.clone();
        }
        self.touch_if_changed(&before, now)
    }

    fn touch_if_changed(&mut self, before: &Lead, now: Timestamp) -> LeadUpdate {
        if self == before {
            return LeadUpdate::Unchanged;
        }
        self.updated_at = now;
        LeadUpdate::Applied
    }
}
