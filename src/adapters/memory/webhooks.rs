//! `WebhookEventRepository` for the in-memory store.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

use super::store::{InMemoryStore, StoreOperation};

#[async_trait]
impl WebhookEventRepository for InMemoryStore {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.webhook_events.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        self.check(StoreOperation::SaveWebhookEvent).await?;
        let mut events = self.webhook_events.write().await;
        if events.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        events.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut events = self.webhook_events.write().await;
        let before = events.len();
        events.retain(|_, r| !r.processed_at.is_before(&cutoff));
        Ok((before - events.len()) as u64)
    }
}
