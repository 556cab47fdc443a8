//! Channel that dispatches on the kind of contact address.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{ContactAddress, DomainError};
use crate::ports::MessageChannel;

/// Sends phone contacts through `sms` and email contacts through `email`.
pub struct AddressRoutingChannel {
    sms: Arc<dyn MessageChannel>,
    email: Arc<dyn MessageChannel>,
}

impl AddressRoutingChannel {
    pub fn new(sms: Arc<dyn MessageChannel>, email: Arc<dyn MessageChannel>) -> Self {
        Self { sms, email }
    }
}

#[async_trait]
impl MessageChannel for AddressRoutingChannel {
    async fn send(&self, to: &ContactAddress, body: &str) -> Result<(), DomainError> {
        match to {
            ContactAddress::Phone(_) => self.sms.send(to, body).await,
            ContactAddress::Email(_) => self.email.send(to, body).await,
        }
    }
}
