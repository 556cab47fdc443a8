//! Messaging configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Verification code delivery (Twilio SMS, Resend email)
///
/// Leaving both providers unset outside production records codes in memory
/// and logs them instead of sending.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Twilio account SID
    #[serde(default)]
    pub twilio_account_sid: String,

    /// Twilio auth token
    #[serde(default)]
    pub twilio_auth_token: String,

    /// Sender number (E.164)
    #[serde(default)]
    pub twilio_from_number: String,

    /// Resend API key
    #[serde(default)]
    pub resend_api_key: String,

    /// From email address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Timeout for provider calls in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl MessagingConfig {
    pub fn sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
    }

    pub fn email_configured(&self) -> bool {
        !self.resend_api_key.is_empty()
    }

    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Validate messaging configuration
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if environment == Environment::Production {
            if !self.sms_configured() {
                return Err(ValidationError::MissingRequired("TWILIO_ACCOUNT_SID"));
            }
            if !self.email_configured() {
                return Err(ValidationError::MissingRequired("RESEND_API_KEY"));
            }
        }

        if self.sms_configured() {
            if !self.twilio_account_sid.starts_with("AC") {
                return Err(ValidationError::InvalidTwilioSid);
            }
            if self.twilio_auth_token.is_empty() {
                return Err(ValidationError::MissingRequired("TWILIO_AUTH_TOKEN"));
            }
            let digits = self.twilio_from_number.strip_prefix('+').unwrap_or("");
            if digits.len() < 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidTwilioFromNumber);
            }
        }

        if self.email_configured() {
            if !self.resend_api_key.starts_with("re_") {
                return Err(ValidationError::InvalidResendKey);
            }
            if !self.from_email.contains('@') {
                return Err(ValidationError::InvalidFromEmail);
            }
        }

        Ok(())
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            resend_api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_from_email() -> String {
    "verify@textline.app".to_string()
}

fn default_from_name() -> String {
    "Textline".to_string()
}

fn default_request_timeout() -> u64 {
    10
}
