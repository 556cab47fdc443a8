//! SignupRequest aggregate.
//!
//! A signup request holds the fields a person submitted and the one-time code
//! sent to their contact address. It is mutated only by code delivery, code
//! verification and resend, and is never reused once it leaves an open state.
//!
//! # Design Decisions
//!
//! - **Explicit lifecycle**: `SignupState` replaces nullable-code and boolean checks
//! - **Fixed precedence**: verified, then expiry, then lockout, then comparison
//! - **Optimistic writes**: `version` guards every update in storage

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    parse_email, ContactAddress, RoutingKey, SignupRequestId, StateMachine, Timestamp,
    ValidationError,
};

use super::{SignupError, SignupState, VerificationCode};

const MAX_NAME_LEN: usize = 200;

/// Limits applied to every signup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupPolicy {
    /// Minutes a code stays valid after it is issued.
    pub code_ttl_minutes: i64,
    /// Mismatches allowed before the request locks.
    pub max_attempts: u32,
    /// Extra codes that may be sent after the first.
    pub max_resends: u32,
}

impl Default for SignupPolicy {
    fn default() -> Self {
        Self {
            code_ttl_minutes: 15,
            max_attempts: 5,
            max_resends: 3,
        }
    }
}

/// Identifying fields submitted at signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupFields {
    pub display_name: String,
    pub company_name: Option<String>,
    pub contact: ContactAddress,
    pub email: Option<String>,
    pub routing_key: RoutingKey,
}

impl SignupFields {
    /// Validates and normalises raw input.
    pub fn new(
        display_name: &str,
        company_name: Option<&str>,
        contact: &str,
        email: Option<&str>,
        routing_key: &str,
    ) -> Result<Self, ValidationError> {
        let display_name = required_name(display_name, "display_name")?;
        let company_name = match company_name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Some(required_name(name, "company_name")?),
            None => None,
        };
        let contact = ContactAddress::parse(contact)?;
        let email = match email.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_email(raw, "email")?),
            None => None,
        };
        let routing_key = RoutingKey::new(routing_key)?;

        Ok(Self {
            display_name,
            company_name,
            contact,
            email,
            routing_key,
        })
    }

    /// Company name, falling back to the person's display name.
    pub fn company_display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(&self.display_name)
    }

    /// Best email for identity and billing: the explicit one, else the contact.
    pub fn billing_email(&self) -> Option<&str> {
        self.email.as_deref().or_else(|| self.contact.email())
    }
}

fn required_name(raw: &str, field: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::invalid_format(
            field,
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(value.to_string())
}

/// SignupRequest aggregate.
///
/// # Invariants
///
/// - `code` is `Some` only while `state` is open
/// - `attempts <= max_attempts`
/// - `verified_at` is set iff `state == Verified`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub id: SignupRequestId,
    pub fields: SignupFields,
    pub code: Option<VerificationCode>,
    pub state: SignupState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub resend_count: u32,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub verified_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    /// Row version for conditional writes. Starts at 1.
    pub version: i64,
}

impl SignupRequest {
    /// Opens a new request with a freshly issued code.
    pub fn create(
        fields: SignupFields,
        code: VerificationCode,
        policy: &SignupPolicy,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SignupRequestId::new(),
            fields,
            code: Some(code),
            state: SignupState::Created,
            attempts: 0,
            max_attempts: policy.max_attempts,
            resend_count: 0,
            created_at: now,
            expires_at: now.plus_minutes(policy.code_ttl_minutes),
            verified_at: None,
            updated_at: now,
            version: 1,
        }
    }

    /// Text delivered through the message channel.
    pub fn verification_message(&self) -> Option<String> {
        let code = self.code.as_ref()?;
        let minutes = self.expires_at.duration_since(&self.updated_at).num_minutes().max(1);
        Some(format!(
            "Your {} verification code is {}. It expires in {} minutes.",
            self.fields.routing_key,
            code.expose(),
            minutes
        ))
    }

    /// True when `now` is past the expiry instant.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now.is_after(&self.expires_at)
    }

    /// Mismatches left before lockout.
    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn is_verified(&self) -> bool {
        self.state == SignupState::Verified
    }

    /// Records that the channel accepted the code.
    pub fn mark_code_sent(&mut self, now: Timestamp) -> Result<(), SignupError> {
        self.transition_to(SignupState::CodeSent, now)
    }

    /// Checks a submitted code.
    ///
    /// Failures may still change the request (attempt counter, `Expired`,
    /// `Locked`); callers persist whenever the aggregate differs from what
    /// they loaded.
    pub fn verify(&mut self, candidate: &str, now: Timestamp) -> Result<(), SignupError> {
        self.ensure_open(now)?;

        let matched = self
            .code
            .as_ref()
            .map(|code| code.matches(candidate))
            .unwrap_or(false);

        if !matched {
            self.attempts += 1;
            self.updated_at = now;
            if self.attempts >= self.max_attempts {
                self.transition_to(SignupState::Locked, now)?;
                self.code = None;
            }
            return Err(SignupError::InvalidCode {
                attempts_remaining: self.attempts_remaining(),
            });
        }

        self.transition_to(SignupState::Verified, now)?;
        self.code = None;
        self.verified_at = Some(now);
        Ok(())
    }

    /// Replaces the code and restarts the expiry window.
    ///
    /// The attempt counter is left as is.
    pub fn resend(
        &mut self,
        code: VerificationCode,
        policy: &SignupPolicy,
        now: Timestamp,
    ) -> Result<(), SignupError> {
        self.ensure_open(now)?;
        if self.resend_count >= policy.max_resends {
            return Err(SignupError::ResendLimitReached);
        }

        self.code = Some(code);
        self.resend_count += 1;
        self.expires_at = now.plus_minutes(policy.code_ttl_minutes);
        self.updated_at = now;
        Ok(())
    }

    /// Applies the verified, expiry and lockout checks in that order.
    ///
    /// Moves the request to `Expired` or `Locked` the first time either is
    /// observed.
    fn ensure_open(&mut self, now: Timestamp) -> Result<(), SignupError> {
        match self.state {
            SignupState::Verified => return Err(SignupError::AlreadyVerified),
            SignupState::Expired => return Err(SignupError::Expired),
            _ => {}
        }

        if self.is_expired_at(now) {
            if self.state != SignupState::Locked {
                self.transition_to(SignupState::Expired, now)?;
                self.code = None;
            }
            return Err(SignupError::Expired);
        }

        if self.state == SignupState::Locked || self.attempts >= self.max_attempts {
            if self.state != SignupState::Locked {
                self.transition_to(SignupState::Locked, now)?;
                self.code = None;
            }
            return Err(SignupError::AttemptsExceeded);
        }

        Ok(())
    }

    fn transition_to(&mut self, target: SignupState, now: Timestamp) -> Result<(), SignupError> {
        self.state = self.state.transition_to(target).map_err(|_| {
            SignupError::validation(
                "state",
                format!("cannot move signup from {} to {}", self.state, target),
            )
        })?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fields() -> SignupFields {
        SignupFields::new("Dana Ruiz", Some("Ruiz Plumbing"), "+15551234567", None, "textline")
            .unwrap()
    }

    fn start() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    fn request_with(code: &str) -> SignupRequest {
        SignupRequest::create(
            fields(),
            VerificationCode::from_stored(code).unwrap(),
            &SignupPolicy::default(),
            start(),
        )
    }

    // ════════════════════════════════════════════════════════════════════
    // Fields
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn fields_require_display_name() {
        let err = SignupFields::new("  ", None, "+15551234567", None, "textline").unwrap_err();
        assert_eq!(err.field(), "display_name");
    }

    #[test]
    fn fields_require_valid_contact() {
        let err = SignupFields::new("Dana", None, "nope", None, "textline").unwrap_err();
        assert_eq!(err.field(), "contact");
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let fields =
            SignupFields::new("Dana", Some(" "), "+15551234567", Some(""), "textline").unwrap();
        assert_eq!(fields.company_name, None);
        assert_eq!(fields.email, None);
        assert_eq!(fields.company_display_name(), "Dana");
    }

    #[test]
    fn billing_email_prefers_explicit_email() {
        let fields = SignupFields::new(
            "Dana",
            None,
            "dana@example.com",
            Some("Billing@Example.com"),
            "textline",
        )
        .unwrap();
        assert_eq!(fields.billing_email(), Some("billing@example.com"));

        let contact_only = SignupFields::new("Dana", None, "dana@example.com", None, "textline")
            .unwrap();
        assert_eq!(contact_only.billing_email(), Some("dana@example.com"));
    }

    // ════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn create_sets_fifteen_minute_expiry() {
        let request = request_with("482913");
        assert_eq!(request.state, SignupState::Created);
        assert_eq!(request.attempts, 0);
        assert_eq!(request.expires_at, start().plus_minutes(15));
        assert_eq!(request.version, 1);
    }

    #[test]
    fn verification_message_contains_code() {
        let request = request_with("482913");
        let message = request.verification_message().unwrap();
        assert!(message.contains("482913"));
        assert!(message.contains("15 minutes"));
    }

    #[test]
    fn mark_code_sent_moves_to_code_sent() {
        let mut request = request_with("482913");
        request.mark_code_sent(start()).unwrap();
        assert_eq!(request.state, SignupState::CodeSent);
    }

    // ════════════════════════════════════════════════════════════════════
    // Verification
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn correct_code_verifies_once() {
        let mut request = request_with("482913");
        let now = start().plus_minutes(3);

        request.verify("482913", now).unwrap();
        assert_eq!(request.state, SignupState::Verified);
        assert_eq!(request.verified_at, Some(now));
        assert!(request.code.is_none());

        assert_eq!(
            request.verify("482913", now),
            Err(SignupError::AlreadyVerified)
        );
    }

    #[test]
    fn wrong_code_increments_attempts() {
        let mut request = request_with("482913");
        let err = request.verify("000000", start()).unwrap_err();
        assert_eq!(err, SignupError::InvalidCode { attempts_remaining: 4 });
        assert_eq!(request.attempts, 1);
        assert!(request.state.is_open());
    }

    #[test]
    fn fifth_mismatch_locks_and_sixth_is_rejected_even_if_correct() {
        let mut request = request_with("482913");
        for attempt in 1..=5 {
            let err = request.verify("111111", start()).unwrap_err();
            assert_eq!(
                err,
                SignupError::InvalidCode {
                    attempts_remaining: 5 - attempt
                }
            );
        }
        assert_eq!(request.state, SignupState::Locked);
        assert_eq!(
            request.verify("482913", start()),
            Err(SignupError::AttemptsExceeded)
        );
        assert_eq!(request.attempts, 5);
    }

    #[test]
    fn code_is_rejected_after_expiry() {
        let mut request = request_with("482913");
        let late = start().plus_minutes(15).plus_secs(1);
        assert_eq!(request.verify("482913", late), Err(SignupError::Expired));
        assert_eq!(request.state, SignupState::Expired);
        assert!(request.code.is_none());
    }

    #[test]
    fn code_is_accepted_at_exact_expiry_instant() {
        let mut request = request_with("482913");
        assert!(request.verify("482913", start().plus_minutes(15)).is_ok());
    }

    #[test]
    fn expiry_takes_precedence_over_lockout() {
        let mut request = request_with("482913");
        for _ in 0..5 {
            let _ = request.verify("111111", start());
        }
        let late = start().plus_minutes(16);
        assert_eq!(request.verify("482913", late), Err(SignupError::Expired));
    }

    #[test]
    fn already_verified_takes_precedence_over_expiry() {
        let mut request = request_with("482913");
        request.verify("482913", start()).unwrap();
        let late = start().plus_minutes(60);
        assert_eq!(
            request.verify("482913", late),
            Err(SignupError::AlreadyVerified)
        );
    }

    #[test]
    fn failed_verification_leaves_verified_request_untouched() {
        let mut request = request_with("482913");
        request.verify("482913", start()).unwrap();
        let before = request.clone();
        let _ = request.verify("000000", start().plus_minutes(1));
        assert_eq!(request, before);
    }

    // ════════════════════════════════════════════════════════════════════
    // Resend
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn resend_replaces_code_and_extends_expiry() {
        let mut request = request_with("482913");
        request.verify("000000", start()).unwrap_err();
        let later = start().plus_minutes(10);

        request
            .resend(
                VerificationCode::from_stored("777777").unwrap(),
                &SignupPolicy::default(),
                later,
            )
            .unwrap();

        assert_eq!(request.expires_at, later.plus_minutes(15));
        assert_eq!(request.attempts, 1);
        assert_eq!(request.resend_count, 1);
        assert!(request.verify("482913", later).is_err());
        assert!(request.verify("777777", later).is_ok());
    }

    #[test]
    fn resend_stops_at_limit() {
        let mut request = request_with("482913");
        let policy = SignupPolicy::default();
        for _ in 0..policy.max_resends {
            request
                .resend(VerificationCode::generate(), &policy, start())
                .unwrap();
        }
        assert_eq!(
            request.resend(VerificationCode::generate(), &policy, start()),
            Err(SignupError::ResendLimitReached)
        );
    }

    #[test]
    fn resend_refused_after_verification_and_expiry() {
        let policy = SignupPolicy::default();

        let mut verified = request_with("482913");
        verified.verify("482913", start()).unwrap();
        assert_eq!(
            verified.resend(VerificationCode::generate(), &policy, start()),
            Err(SignupError::AlreadyVerified)
        );

        let mut expired = request_with("482913");
        assert_eq!(
            expired.resend(VerificationCode::generate(), &policy, start().plus_minutes(20)),
            Err(SignupError::Expired)
        );
    }

    #[test]
    fn resend_does_not_unlock() {
        let mut request = request_with("482913");
        for _ in 0..5 {
            let _ = request.verify("111111", start());
        }
        assert_eq!(
            request.resend(VerificationCode::generate(), &SignupPolicy::default(), start()),
            Err(SignupError::AttemptsExceeded)
        );
    }

    // ════════════════════════════════════════════════════════════════════
    // Properties
    // ════════════════════════════════════════════════════════════════════

    proptest! {
        #[test]
        fn never_verifies_after_expiry(secs_late in 1i64..1_000_000) {
            let mut request = request_with("482913");
            let now = request.expires_at.plus_secs(secs_late);
            prop_assert_eq!(request.verify("482913", now), Err(SignupError::Expired));
        }

        #[test]
        fn lockout_holds_for_any_later_submission(
            wrong in "[0-9]{6}",
            later in "[0-9]{6}",
        ) {
            prop_assume!(wrong != "482913");
            let mut request = request_with("482913");
            for _ in 0..5 {
                let _ = request.verify(&wrong, start());
            }
            prop_assert_eq!(request.verify(&later, start()), Err(SignupError::AttemptsExceeded));
            prop_assert_eq!(request.verify("482913", start()), Err(SignupError::AttemptsExceeded));
        }

        #[test]
        fn a_matched_code_never_matches_again(offset in 0i64..900) {
            let mut request = request_with("482913");
            let now = start().plus_secs(offset);
            prop_assert!(request.verify("482913", now).is_ok());
            prop_assert_eq!(request.verify("482913", now), Err(SignupError::AlreadyVerified));
        }
    }
}
