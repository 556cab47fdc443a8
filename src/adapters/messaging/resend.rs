//! Resend email channel.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::foundation::{ContactAddress, DomainError};
use crate::ports::MessageChannel;

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

/// Resend credentials and sender identity.
#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: SecretString,
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl ResendConfig {
    pub fn new(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            from_email: from_email.into(),
            from_name: from_name.into(),
            subject: "Your verification code".to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Email delivery through Resend.
pub struct ResendEmailChannel {
    config: ResendConfig,
    http_client: reqwest::Client,
}

impl ResendEmailChannel {
    pub fn new(config: ResendConfig) -> Self {
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
impl MessageChannel for ResendEmailChannel {
    async fn send(&self, to: &ContactAddress, body: &str) -> Result<(), DomainError> {
        let Some(email) = to.email() else {
            return Err(DomainError::validation(
                "contact",
                "email channel can only deliver to email addresses",
            ));
        };

        let request = SendEmailRequest {
            from: self.config.from_header(),
            to: [email],
            subject: &self.config.subject,
            text: body,
        };
        let response = self
            .http_client
            .post(format!("{}/emails", self.config.api_base_url.trim_end_matches('/')))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::external(format!("Resend unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(to = %to.masked(), status = status.as_u16(), error = %error_text, "Resend send failed");
            return Err(DomainError::external(format!("Resend returned {}", status)));
        }
        tracing::debug!(to = %to.masked(), "email accepted");
        Ok(())
    }
}
