//! Checkout correlation metadata.
//!
//! The same identifier bag is written into both the checkout session metadata
//! and the subscription metadata, so every later processor event can be tied
//! back to a tenant without knowing which checkout mode produced it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{CompanyId, RoutingKey, UserId, ValidationError};

pub const KEY_USER_ID: &str = "user_id";
pub const KEY_COMPANY_ID: &str = "company_id";
pub const KEY_ROUTING_KEY: &str = "routing_key";
pub const KEY_CUSTOMER_TYPE: &str = "customer_type";
pub const KEY_REFERENCE: &str = "reference";

/// Who started the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    /// A person who finished signup and provisioning.
    Onboarding,
    /// A visitor from a marketing funnel, not yet known locally.
    Marketing,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Onboarding => "onboarding",
            CustomerType::Marketing => "marketing",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding" => Ok(CustomerType::Onboarding),
            "marketing" => Ok(CustomerType::Marketing),
            other => Err(ValidationError::invalid_format(
                KEY_CUSTOMER_TYPE,
                format!("unknown customer type '{}'", other),
            )),
        }
    }
}

/// How the checkout session is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Payer email known: reuse or create the processor customer up front.
    Identified,
    /// Payer unknown: the processor creates the customer during checkout.
    PaymentFirst,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Identified => "identified",
            CheckoutMode::PaymentFirst => "payment_first",
        }
    }
}

/// Identifier bag attached to checkout sessions and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub user_id: Option<UserId>,
    pub company_id: Option<CompanyId>,
    pub routing_key: RoutingKey,
    pub customer_type: CustomerType,
    pub reference: Option<String>,
}

impl CheckoutMetadata {
    /// Flattens into processor metadata. Absent values are omitted.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(user_id) = &self.user_id {
            map.insert(KEY_USER_ID.to_string(), user_id.to_string());
        }
        if let Some(company_id) = &self.company_id {
            map.insert(KEY_COMPANY_ID.to_string(), company_id.to_string());
        }
        map.insert(KEY_ROUTING_KEY.to_string(), self.routing_key.to_string());
        map.insert(
            KEY_CUSTOMER_TYPE.to_string(),
            self.customer_type.to_string(),
        );
        if let Some(reference) = &self.reference {
            map.insert(KEY_REFERENCE.to_string(), reference.clone());
        }
        map
    }

    /// Reads the bag back from processor metadata.
    ///
    /// `routing_key` is required. A missing `customer_type` means the session
    /// came from a marketing funnel. Blank values count as absent.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        let get = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let routing_key = get(KEY_ROUTING_KEY)
            .ok_or_else(|| ValidationError::empty_field(KEY_ROUTING_KEY))
            .and_then(RoutingKey::new)?;
        let user_id = get(KEY_USER_ID).map(UserId::new).transpose()?;
        let company_id = get(KEY_COMPANY_ID)
            .map(|raw| {
                raw.parse::<CompanyId>()
                    .map_err(|_| ValidationError::invalid_format(KEY_COMPANY_ID, "not a UUID"))
            })
            .transpose()?;
        let customer_type = get(KEY_CUSTOMER_TYPE)
            .map(str::parse::<CustomerType>)
            .transpose()?
            .unwrap_or(CustomerType::Marketing);

        Ok(Self {
            user_id,
            company_id,
            routing_key,
            customer_type,
            reference: get(KEY_REFERENCE).map(str::to_string),
        })
    }
}
