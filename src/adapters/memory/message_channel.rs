//! Message channel that records instead of delivering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::{ContactAddress, DomainError};
use crate::ports::MessageChannel;

/// A message the channel accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: ContactAddress,
    pub body: String,
}

/// Records every accepted message; can be switched to refuse delivery.
#[derive(Debug, Default)]
pub struct RecordingMessageChannel {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
    log_bodies: bool,
}

impl RecordingMessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that refuses every message.
    pub fn failing() -> Self {
        let channel = Self::new();
        channel.set_failing(true);
        channel
    }

    /// A channel that also logs each body, for running without providers.
    pub fn logging() -> Self {
        Self {
            log_bodies: true,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent().last().map(|m| m.body.clone())
    }

    /// Pulls the digits out of the most recent message.
    pub fn last_code(&self) -> Option<String> {
        self.last_body().and_then(|body| {
            body.split_whitespace()
                .map(|word| word.trim_end_matches('.'))
                .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl MessageChannel for RecordingMessageChannel {
    async fn send(&self, to: &ContactAddress, body: &str) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::external(format!(
                "delivery to {} refused",
                to.masked()
            )));
        }
        if self.log_bodies {
            tracing::info!(to = %to.masked(), body, "message recorded, not delivered");
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                to: to.clone(),
                body: body.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_extracts_code() {
        let channel = RecordingMessageChannel::new();
        let to = ContactAddress::parse("+15551234567").unwrap();
        channel
            .send(&to, "Your textline verification code is 482913. It expires in 15 minutes.")
            .await
            .unwrap();

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(channel.last_code().as_deref(), Some("482913"));
    }

    #[tokio::test]
    async fn failing_channel_records_nothing() {
        let channel = RecordingMessageChannel::failing();
        let to = ContactAddress::parse("dana@example.com").unwrap();

        assert!(channel.send(&to, "hello").await.is_err());
        assert!(channel.sent().is_empty());
    }
}
