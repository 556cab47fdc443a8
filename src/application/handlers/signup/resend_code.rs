//! ResendCodeHandler - issues a fresh code for an open request.

use std::sync::Arc;

use crate::domain::foundation::{SignupRequestId, Timestamp};
use crate::domain::signup::{SignupError, SignupPolicy, VerificationCode};
use crate::ports::{Clock, MessageChannel, SignupRepository};

#[derive(Debug, Clone)]
pub struct ResendCodeCommand {
    pub signup_id: SignupRequestId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendCodeResult {
    pub signup_id: SignupRequestId,
    pub expires_at: Timestamp,
    pub resends_remaining: u32,
}

/// Handler for code resends.
///
/// The new code replaces the old one and restarts the expiry window. The
/// attempt counter is never reset. Nothing is stored unless the channel
/// accepted the new code.
pub struct ResendCodeHandler {
    repository: Arc<dyn SignupRepository>,
    channel: Arc<dyn MessageChannel>,
    clock: Arc<dyn Clock>,
    policy: SignupPolicy,
}

impl ResendCodeHandler {
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

    pub async fn handle(&self, cmd: ResendCodeCommand) -> Result<ResendCodeResult, SignupError> {
        let mut request = self
            .repository
            .find_by_id(&cmd.signup_id)
            .await?
            .ok_or(SignupError::NotFound(cmd.signup_id))?;

        let loaded = request.clone();
        let now = self.clock.now();

        if let Err(err) = request.resend(VerificationCode::generate(), &self.policy, now) {
            // Expiry or lockout observed for the first time is still recorded.
            if request != loaded {
                self.repository.update(&request).await?;
            }
            return Err(err);
        }

        let body = request
            .verification_message()
            .ok_or_else(|| SignupError::upstream("no code to deliver"))?;
        self.channel
            .send(&request.fields.contact, &body)
            .await
            .map_err(|err| {
                tracing::warn!(signup_id = %request.id, error = %err, "resend delivery failed");
                SignupError::upstream(format!("message delivery failed: {}", err.message()))
            })?;

        request.mark_code_sent(now)?;
        self.repository.update(&request).await?;

        tracing::info!(
            signup_id = %request.id,
            resend_count = request.resend_count,
            "verification code resent"
        );

        Ok(ResendCodeResult {
            signup_id: request.id,
            expires_at: request.expires_at,
            resends_remaining: self.policy.max_resends.saturating_sub(request.resend_count),
        })
    }
}
