//! One-time verification codes.

use rand::Rng;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::domain::foundation::ValidationError;

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// A six digit, zero padded, single-use code.
///
/// `Debug` is redacted so the code never lands in logs through `{:?}`.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Generates a fresh code from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generates a code from the given RNG.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value: u32 = rng.gen_range(0..1_000_000);
        Self(format!("{:06}", value))
    }

    /// Rebuilds a code read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.len() != CODE_LENGTH || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "verification_code",
                "must be exactly six digits",
            ));
        }
        Ok(Self(value))
    }

    /// Compares a submitted code in constant time.
    ///
    /// Surrounding whitespace in the submission is ignored.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.len() != self.0.len() {
            return false;
        }
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Digits, for message delivery and persistence only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(******)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = VerificationCode::generate_with(&mut rng);
            assert_eq!(code.expose().len(), CODE_LENGTH);
            assert!(code.expose().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn matches_exact_code_only() {
        let code = VerificationCode::from_stored("482913").unwrap();
        assert!(code.matches("482913"));
        assert!(code.matches(" 482913\n"));
        assert!(!code.matches("482914"));
        assert!(!code.matches("48291"));
        assert!(!code.matches("4829130"));
        assert!(!code.matches(""));
    }

    #[test]
    fn leading_zeros_are_preserved() {
        let code = VerificationCode::from_stored("000042").unwrap();
        assert!(code.matches("000042"));
        assert!(!code.matches("42"));
    }

    #[test]
    fn from_stored_rejects_malformed_values() {
        assert!(VerificationCode::from_stored("12345").is_err());
        assert!(VerificationCode::from_stored("12a456").is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let code = VerificationCode::from_stored("482913").unwrap();
        assert!(!format!("{:?}", code).contains("482913"));
    }
}
