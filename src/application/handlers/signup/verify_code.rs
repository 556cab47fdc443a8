//! VerifyCodeHandler - checks a submitted one-time code.

use std::sync::Arc;

use crate::domain::foundation::{SignupRequestId, Timestamp};
use crate::domain::signup::SignupError;
use crate::ports::{Clock, SignupRepository};

/// Command to verify a code.
#[derive(Debug, Clone)]
pub struct VerifyCodeCommand {
    pub signup_id: SignupRequestId,
    pub code: String,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCodeResult {
    pub signup_id: SignupRequestId,
    pub verified_at: Timestamp,
}

/// Handler for code verification.
///
/// Failed checks that change the request (attempt counter, lockout, expiry)
/// are persisted before the error is returned. If that write loses a race the
/// caller gets `ConcurrentModification`, so a guess is never left uncounted.
pub struct VerifyCodeHandler {
    repository: Arc<dyn SignupRepository>,
    clock: Arc<dyn Clock>,
}

impl VerifyCodeHandler {
    pub fn new(repository: Arc<dyn SignupRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn handle(&self, cmd: VerifyCodeCommand) -> Result<VerifyCodeResult, SignupError> {
        let mut request = self
            .repository
            .find_by_id(&cmd.signup_id)
            .await?
            .ok_or(SignupError::NotFound(cmd.signup_id))?;

        let loaded = request.clone();
        let now = self.clock.now();
        let outcome = request.verify(&cmd.code, now);

        if request != loaded {
            self.repository.update(&request).await?;
        }

        match outcome {
            Ok(()) => {
                tracing::info!(signup_id = %request.id, "signup verified");
                Ok(VerifyCodeResult {
                    signup_id: request.id,
                    verified_at: request.verified_at.unwrap_or(now),
                })
            }
            Err(err) => {
                tracing::info!(
                    signup_id = %request.id,
                    attempts = request.attempts,
                    state = %request.state,
                    reason = err.code(),
                    "verification rejected"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::test_support::{clock, stored_signup, CODE};
    use crate::adapters::memory::{InMemoryStore, ManualClock, StoreOperation};
    use crate::domain::signup::SignupState;

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        handler: VerifyCodeHandler,
        signup_id: SignupRequestId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = clock();
        let request = stored_signup(&store, "+15551234567").await;
        let handler = VerifyCodeHandler::new(store.clone(), clock.clone());
        Fixture {
            store,
            clock,
            handler,
            signup_id: request.id,
        }
    }

    fn cmd(f: &Fixture, code: &str) -> VerifyCodeCommand {
        VerifyCodeCommand {
            signup_id: f.signup_id,
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn correct_code_verifies_once() {
        let f = fixture().await;
        f.handler.handle(cmd(&f, CODE)).await.unwrap();

        let err = f.handler.handle(cmd(&f, CODE)).await.unwrap_err();
        assert_eq!(err, SignupError::AlreadyVerified);

        let stored = f.store.find_by_id(&f.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SignupState::Verified);
        assert!(stored.code.is_none());
    }

    #[tokio::test]
    async fn wrong_code_is_counted_in_storage() {
        let f = fixture().await;
        let err = f.handler.handle(cmd(&f, "000000")).await.unwrap_err();
        assert_eq!(
            err,
            SignupError::InvalidCode {
                attempts_remaining: 4
            }
        );

        let stored = f.store.find_by_id(&f.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn sixth_attempt_is_locked_out_even_with_right_code() {
        let f = fixture().await;
        for _ in 0..5 {
            f.handler.handle(cmd(&f, "111111")).await.unwrap_err();
        }

        let err = f.handler.handle(cmd(&f, CODE)).await.unwrap_err();
        assert_eq!(err, SignupError::AttemptsExceeded);
        let stored = f.store.find_by_id(&f.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SignupState::Locked);
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_persisted() {
        let f = fixture().await;
        f.clock.advance_minutes(16);

        let err = f.handler.handle(cmd(&f, CODE)).await.unwrap_err();
        assert_eq!(err, SignupError::Expired);
        let stored = f.store.find_by_id(&f.signup_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SignupState::Expired);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let f = fixture().await;
        let missing = SignupRequestId::new();
        let err = f
            .handler
            .handle(VerifyCodeCommand {
                signup_id: missing,
                code: CODE.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, SignupError::NotFound(missing));
    }

    #[tokio::test]
    async fn unrecorded_attempt_fails_the_call() {
        let f = fixture().await;
        f.store.fail(StoreOperation::UpdateSignup).await;

        let err = f.handler.handle(cmd(&f, "000000")).await.unwrap_err();
        assert!(matches!(err, SignupError::Upstream(_)));
    }
}
