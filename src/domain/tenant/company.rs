//! Company entity and account numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{CompanyId, RoutingKey, SignupRequestId, Timestamp, ValidationError};

/// Offset added to the raw sequence value so account numbers have six digits.
const ACCOUNT_NUMBER_BASE: i64 = 100_000;

/// Human facing account number, unique per routing key.
///
/// Produced by the storage sequence, never supplied by a client. Rendered as
/// `<ROUTING-KEY>-<number>`, e.g. `TEXTLINE-100042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccountNumber {
    prefix: String,
    number: i64,
}

impl AccountNumber {
    /// Builds an account number from the next sequence value for `routing_key`.
    pub fn from_sequence(routing_key: &RoutingKey, sequence_value: i64) -> Self {
        Self {
            prefix: routing_key.as_str().to_ascii_uppercase(),
            number: ACCOUNT_NUMBER_BASE + sequence_value,
        }
    }

    pub fn number(&self) -> i64 {
        self.number
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.number)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (prefix, number) = value.rsplit_once('-').ok_or_else(|| {
            ValidationError::invalid_format("account_number", "expected PREFIX-NUMBER")
        })?;
        let number = number.parse::<i64>().map_err(|_| {
            ValidationError::invalid_format("account_number", "number part is not numeric")
        })?;
        if prefix.is_empty() {
            return Err(ValidationError::empty_field("account_number"));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            number,
        })
    }
}

/// A tenant. One company is created per verified signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub routing_key: RoutingKey,
    pub name: String,
    pub account_number: AccountNumber,
    /// The signup this company was provisioned from. Unique.
    pub signup_request_id: SignupRequestId,
    pub created_at: Timestamp,
}

impl Company {
    pub fn new(
        routing_key: RoutingKey,
        name: impl Into<String>,
        account_number: AccountNumber,
        signup_request_id: SignupRequestId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: CompanyId::new(),
            routing_key,
            name: name.into(),
            account_number,
            signup_request_id,
            created_at: now,
        }
    }
}
