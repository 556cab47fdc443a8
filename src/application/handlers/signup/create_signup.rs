//! CreateSignupHandler - opens a signup request and delivers its code.

use std::sync::Arc;

use crate::domain::foundation::{SignupRequestId, Timestamp};
use crate::domain::signup::{
    SignupError, SignupFields, SignupPolicy, SignupRequest, SignupState, VerificationCode,
};
use crate::ports::{Clock, MessageChannel, SignupRepository};

/// Command to start a signup.
#[derive(Debug, Clone)]
pub struct CreateSignupCommand {
    pub display_name: String,
    pub company_name: Option<String>,
    /// Phone number or email the code is sent to.
    pub contact: String,
    pub email: Option<String>,
    pub routing_key: String,
}

/// Result of a created signup. Never carries the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSignupResult {
    pub signup_id: SignupRequestId,
    /// `CodeSent` when the channel accepted the message, else `Created`.
    pub state: SignupState,
    pub expires_at: Timestamp,
}

/// Handler for new signups.
///
/// Delivery failures do not fail the signup: the request is kept in
/// `Created` and the caller can ask for a resend.
pub struct CreateSignupHandler {
    repository: Arc<dyn SignupRepository>,
    channel: Arc<dyn MessageChannel>,
    clock: Arc<dyn Clock>,
    policy: SignupPolicy,
}

impl CreateSignupHandler {
    pub fn new(
        repository: Arc<dyn SignupRepository>,
        channel: Arc<dyn MessageChannel>,
        clock: Arc<dyn Clock>,
        policy: SignupPolicy,
    ) -> Self {
        Self {
            repository,
            channel,
            clock,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSignupCommand,
    ) -> Result<CreateSignupResult, SignupError> {
        let fields = SignupFields::new(
            &cmd.display_name,
            cmd.company_name.as_deref(),
            &cmd.contact,
            cmd.email.as_deref(),
            &cmd.routing_key,
        )?;

        let now = self.clock.now();
        let mut request =
            SignupRequest::create(fields, VerificationCode::generate(), &self.policy, now);
        self.repository.insert(&request).await?;

        tracing::info!(
            signup_id = %request.id,
            routing_key = %request.fields.routing_key,
            contact = %request.fields.contact.masked(),
            "signup request created"
        );

        let state = self.deliver(&mut request, now).await;

        Ok(CreateSignupResult {
            signup_id: request.id,
            state,
            expires_at: request.expires_at,
        })
    }

    /// Sends the code and records `CodeSent`. Returns the stored state.
    async fn deliver(&self, request: &mut SignupRequest, now: Timestamp) -> SignupState {
        let Some(body) = request.verification_message() else {
            return request.state;
        };

        if let Err(err) = self.channel.send(&request.fields.contact, &body).await {
            tracing::warn!(
                signup_id = %request.id,
                error = %err,
                "verification code delivery failed, request kept for resend"
            );
            return request.state;
        }

        let mut sent = request.clone();
        if let Err(err) = sent.mark_code_sent(now) {
            tracing::warn!(signup_id = %request.id, error = %err, "could not mark code sent");
            return request.state;
        }
        match self.repository.update(&sent).await {
            Ok(()) => {
                *request = sent;
                request.state
            }
            Err(err) => {
                tracing::warn!(
                    signup_id = %request.id,
                    error = %err,
                    "code delivered but state update failed"
                );
                request.state
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::test_support::{clock, T0};
    use crate::adapters::memory::{InMemoryStore, RecordingMessageChannel, StoreOperation};

    struct Fixture {
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingMessageChannel>,
        handler: CreateSignupHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingMessageChannel::new());
        let handler = CreateSignupHandler::new(
            store.clone(),
            channel.clone(),
            clock(),
            SignupPolicy::default(),
        );
        Fixture {
            store,
            channel,
            handler,
        }
    }

    fn command() -> CreateSignupCommand {
        CreateSignupCommand {
            display_name: "Dana Ruiz".to_string(),
            company_name: Some("Ruiz Plumbing".to_string()),
            contact: "+15551234567".to_string(),
            email: None,
            routing_key: "textline".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_request_and_sends_code() {
        let f = fixture();
        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(result.state, SignupState::CodeSent);
        assert_eq!(result.expires_at.as_unix_secs(), T0 + 15 * 60);

        let stored = f.store.find_by_id(&result.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SignupState::CodeSent);
        assert_eq!(stored.attempts, 0);

        let code = f.channel.last_code().unwrap();
        assert!(stored.code.unwrap().matches(&code));
        assert_eq!(f.channel.sent()[0].to.as_str(), "+15551234567");
    }

    #[tokio::test]
    async fn delivery_failure_keeps_request() {
        let f = fixture();
        f.channel.set_failing(true);

        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(result.state, SignupState::Created);
        let stored = f.store.find_by_id(&result.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SignupState::Created);
        assert!(stored.code.is_some());
    }

    #[tokio::test]
    async fn missing_name_is_a_validation_error() {
        let f = fixture();
        let mut cmd = command();
        cmd.display_name = "  ".to_string();

        let err = f.handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, SignupError::Validation { ref field, .. } if field == "display_name"));
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_upstream() {
        let f = fixture();
        f.store.fail(StoreOperation::InsertSignup).await;

        let err = f.handler.handle(command()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(f.channel.sent().is_empty());
    }
}
