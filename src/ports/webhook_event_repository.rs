//! WebhookEventRepository port - ledger of Stripe events already handled.
//!
//! Stripe may deliver the same event more than once (timeouts, 5xx retries,
//! lost acknowledgements). The ledger lets the reconciler skip work it has
//! already done. Handlers stay idempotent without it; the ledger only saves
//! the round-trips.
//!
//! Only events that were processed or deliberately ignored are recorded. A
//! failed event is left out so the processor's retry runs it again.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, Timestamp, ValidationError};

/// How an event was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Handler ran and applied (or re-applied) its changes.
    Processed,
    /// Unknown kind or nothing to do.
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
        }
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(WebhookOutcome::Processed),
            "ignored" => Ok(WebhookOutcome::Ignored),
            other => Err(ValidationError::invalid_format(
                "outcome",
                format!("unknown webhook outcome '{}'", other),
            )),
        }
    }
}

/// Record of a settled webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
    /// Why the event was ignored, when it was.
    pub note: Option<String>,
    pub processed_at: Timestamp,
    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn processed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        now: Timestamp,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Processed,
            note: None,
            processed_at: now,
            payload,
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
        now: Timestamp,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Ignored,
            note: Some(reason.into()),
            processed_at: now,
            payload,
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for storing and retrieving settled webhook events.
///
/// Implementations use a primary key on `event_id` so concurrent deliveries
/// of the same event cannot both insert.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Inserts with `ON CONFLICT DO NOTHING` semantics.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Deletes records processed before `cutoff`. Returns the count.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_record_has_no_note() {
        let record = WebhookEventRecord::processed(
            "evt_123",
            "checkout.session.completed",
            serde_json::json!({"id": "evt_123"}),
            Timestamp::from_unix_secs(1_700_000_000),
        );

        assert_eq!(record.event_id, "evt_123");
        assert_eq!(record.outcome, WebhookOutcome::Processed);
        assert!(record.note.is_none());
    }

    #[test]
    fn ignored_record_includes_reason() {
        let record = WebhookEventRecord::ignored(
            "evt_456",
            "customer.tax_id.created",
            "unhandled event type",
            serde_json::json!({}),
            Timestamp::from_unix_secs(1_700_000_000),
        );

        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.note.as_deref(), Some("unhandled event type"));
    }

    #[test]
    fn outcome_parses_storage_value() {
        assert_eq!(
            "ignored".parse::<WebhookOutcome>().unwrap(),
            WebhookOutcome::Ignored
        );
        assert!("failed".parse::<WebhookOutcome>().is_err());
    }
}
