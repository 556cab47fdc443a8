//! Twilio SMS channel.
//!
//! Sends with `POST /2010-04-01/Accounts/{sid}/Messages.json`, form encoded,
//! basic auth with the account SID and auth token.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{ContactAddress, DomainError};
use crate::ports::MessageChannel;

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// Twilio credentials and sender.
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sending number in E.164 form.
    pub from_number: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl TwilioConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: SecretString::new(auth_token.into()),
            from_number: from_number.into(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

/// SMS delivery through Twilio.
pub struct TwilioSmsChannel {
    config: TwilioConfig,
    http_client: reqwest::Client,
}

impl TwilioSmsChannel {
    pub fn new(config: TwilioConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl MessageChannel for TwilioSmsChannel {
    async fn send(&self, to: &ContactAddress, body: &str) -> Result<(), DomainError> {
        let ContactAddress::Phone(number) = to else {
            return Err(DomainError::validation(
                "contact",
                "SMS channel can only deliver to phone numbers",
            ));
        };

        let params = [
            ("To", number.as_str()),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];
        let response = self
            .http_client
            .post(self.config.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&params)
            .send()
            .await
            .map_err(|e| DomainError::external(format!("Twilio unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(to = %to.masked(), status = status.as_u16(), error = %error_text, "Twilio send failed");
            return Err(DomainError::external(format!("Twilio returned {}", status)));
        }

        let message: TwilioMessage = response.json().await.map_err(|e| {
            DomainError::external(format!("Failed to parse Twilio response: {}", e))
        })?;
        tracing::debug!(to = %to.masked(), message_sid = %message.sid, "SMS accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_includes_account() {
        let config = TwilioConfig::new("AC123", "token", "+15550000000")
            .with_base_url("http://localhost:4010/");
        assert_eq!(
            config.messages_url(),
            "http://localhost:4010/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn email_address_is_refused_without_network() {
        let channel = TwilioSmsChannel::new(TwilioConfig::new("AC123", "token", "+15550000000"));
        let to = ContactAddress::parse("dana@example.com").unwrap();

        let err = channel.send(&to, "code").await.unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::ValidationFailed);
    }
}
