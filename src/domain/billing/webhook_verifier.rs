//! Stripe webhook signature verification.
//!
//! HMAC-SHA256 over `"<timestamp>.<payload>"`, compared in constant time, with
//! a replay window on the signed timestamp.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;
use super::stripe_event::StripeEvent;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Every `v1` entry. Stripe sends several while a secret is being rolled.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>[,v1=<signature>...]`.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for Stripe webhook signatures.
#[derive(Clone)]
pub struct WebhookSignatureVerifier {
    secret: String,
    require_livemode: bool,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            require_livemode: false,
        }
    }

    /// Rejects test-mode events once verified.
    pub fn require_livemode(mut self, required: bool) -> Self {
        self.require_livemode = required;
        self
    }

    /// Verifies against the current wall clock and parses the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        self.verify_and_parse_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verifies as of `now` (unix seconds) and parses the event.
    ///
    /// # Errors
    ///
    /// - `ParseError` - malformed header or JSON
    /// - `TimestampOutOfRange` - signed more than 5 minutes ago
    /// - `InvalidTimestamp` - signed in the future beyond skew
    /// - `InvalidSignature` - no `v1` entry matches
    /// - `LivemodeMismatch` - test event while live mode is required
    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        validate_timestamp(header.timestamp, now)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        if self.require_livemode && !event.is_live() {
            return Err(WebhookError::LivemodeMismatch);
        }

        Ok(event)
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    let age = now - timestamp;
    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }
    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Produces a `Stripe-Signature` header value for `payload`.
///
/// Used by tests and local tooling that replay events against the endpoint.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> String {
    let signature = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(format!("{}.{}", timestamp, payload).as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };
    format!("t={},v1={}", timestamp, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_704_067_200;

    fn payload(livemode: bool) -> String {
        serde_json::json!({
            "id": "evt_test123",
            "type": "checkout.session.completed",
            "created": NOW,
            "data": { "object": { "id": "cs_1" } },
            "livemode": livemode
        })
        .to_string()
    }

    // ══════════════════════════════════════════════════════════════
    // Header parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_with_v1_only() {
        let header = SignatureHeader::parse(&format!("t=1234567890,v1={}", "a".repeat(64))).unwrap();
        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signatures.len(), 1);
        assert_eq!(header.v1_signatures[0].len(), 32);
    }

    #[test]
    fn parse_header_collects_every_v1() {
        let header = SignatureHeader::parse(&format!(
            "t=1,v1={},v1={},v0={}",
            "a".repeat(64),
            "b".repeat(64),
            "c".repeat(64)
        ))
        .unwrap();
        assert_eq!(header.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_missing_parts_fails() {
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "a".repeat(64))),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1234567890"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1234567890,v1=not_hex"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("garbage"),
            Err(WebhookError::ParseError(_))
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verify_valid_signature() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET);
        let body = payload(false);
        let header = sign_payload(TEST_SECRET, NOW, &body);

        let event = verifier.verify_and_parse_at(body.as_bytes(), &header, NOW).unwrap();
        assert_eq!(event.id, "evt_test123");
    }

    #[test]
    fn verify_wrong_secret_fails() {
        let verifier = WebhookSignatureVerifier::new("whsec_other");
        let body = payload(false);
        let header = sign_payload(TEST_SECRET, NOW, &body);

        assert!(matches!(
            verifier.verify_and_parse_at(body.as_bytes(), &header, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn verify_tampered_payload_fails() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET);
        let header = sign_payload(TEST_SECRET, NOW, &payload(false));
        let tampered = payload(false).replace("cs_1", "cs_2");

        assert!(matches!(
            verifier.verify_and_parse_at(tampered.as_bytes(), &header, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET);
        let body = payload(false);
        let good = sign_payload(TEST_SECRET, NOW, &body);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "a".repeat(64), good_sig);

        assert!(verifier.verify_and_parse_at(body.as_bytes(), &header, NOW).is_ok());
    }

    #[test]
    fn replayed_event_outside_window_fails() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET);
        let body = payload(false);
        let header = sign_payload(TEST_SECRET, NOW - 301, &body);

        assert!(matches!(
            verifier.verify_and_parse_at(body.as_bytes(), &header, NOW),
            Err(WebhookError::TimestampOutOfRange)
        ));
    }

    #[test]
    fn timestamp_boundaries() {
        assert!(validate_timestamp(NOW - 300, NOW).is_ok());
        assert!(validate_timestamp(NOW + 60, NOW).is_ok());
        assert!(matches!(
            validate_timestamp(NOW + 61, NOW),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn invalid_json_fails_after_signature() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET);
        let header = sign_payload(TEST_SECRET, NOW, "not json");
        assert!(matches!(
            verifier.verify_and_parse_at(b"not json", &header, NOW),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn livemode_requirement_rejects_test_events() {
        let verifier = WebhookSignatureVerifier::new(TEST_SECRET).require_livemode(true);
        let test_body = payload(false);
        let live_body = payload(true);

        assert!(matches!(
            verifier.verify_and_parse_at(
                test_body.as_bytes(),
                &sign_payload(TEST_SECRET, NOW, &test_body),
                NOW
            ),
            Err(WebhookError::LivemodeMismatch)
        ));
        assert!(verifier
            .verify_and_parse_at(
                live_body.as_bytes(),
                &sign_payload(TEST_SECRET, NOW, &live_body),
                NOW
            )
            .is_ok());
    }

    #[test]
    fn constant_time_compare_checks_length() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2], &[1, 2, 3]));
    }
}
