//! Zitadel user management adapter.
//!
//! Implements the `IdentityProvider` port with Zitadel's v2 user API:
//!
//! - `POST /v2/users/human` creates a human user in the configured
//!   organization under the id the caller chose
//! - `GET /v2/users/{id}` tells whether an earlier attempt created it
//! - `DELETE /v2/users/{id}` removes it again during compensation
//!
//! Usernames are scoped by routing key, so the same contact can sign up
//! under several brands.
//!
//! Calls authenticate with a service user's personal access token.
//!
//! # Example
//!
//! ```ignore
//! let config = ZitadelConfig::new("https://auth.example.com", token, "org-123");
//! let identity = ZitadelIdentityProvider::new(config);
//! let user_id = identity.create_identity(&new_identity).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ContactAddress, DomainError, UserId};
use crate::ports::{IdentityProvider, NewIdentity};

/// Configuration for the Zitadel adapter.
#[derive(Clone)]
pub struct ZitadelConfig {
    /// Instance URL (e.g., "https://auth.example.com").
    pub authority: String,

    /// Personal access token of a service user with user write rights.
    pub service_token: SecretString,

    /// Organization new users are created in.
    pub organization_id: String,

    pub request_timeout: Duration,
}

impl ZitadelConfig {
    pub fn new(
        authority: impl Into<String>,
        service_token: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            service_token: SecretString::new(service_token.into()),
            organization_id: organization_id.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn users_url(&self) -> String {
        format!("{}/v2/users", self.authority.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddHumanUserRequest {
    user_id: String,
    username: String,
    organization: Organization,
    profile: Profile,
    email: EmailField,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<PhoneField>,
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    org_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    given_name: String,
    family_name: String,
    display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailField {
    email: String,
    is_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PhoneField {
    phone: String,
    is_verified: bool,
}

/// Metadata values are base64 encoded on the wire.
#[derive(Debug, Serialize)]
struct MetadataEntry {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddHumanUserResponse {
    user_id: String,
}

/// Zitadel-backed identity provider.
pub struct ZitadelIdentityProvider {
    config: ZitadelConfig,
    http_client: reqwest::Client,
}

impl ZitadelIdentityProvider {
    pub fn new(config: ZitadelConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }

    fn request_for(&self, identity: &NewIdentity) -> AddHumanUserRequest {
        let (given_name, family_name) = split_name(&identity.display_name);

        // The verified contact is the login; phone-only signups get a
        // non-deliverable login email because Zitadel requires one.
        let (email, email_verified) = match (&identity.contact, &identity.email) {
            (ContactAddress::Email(email), _) => (email.clone(), true),
            (ContactAddress::Phone(_), Some(email)) => (email.clone(), false),
            (ContactAddress::Phone(phone), None) => (placeholder_email(phone, identity), false),
        };
        let phone = match &identity.contact {
            ContactAddress::Phone(phone) => Some(PhoneField {
                phone: phone.clone(),
                is_verified: true,
            }),
            ContactAddress::Email(_) => None,
        };

        AddHumanUserRequest {
            user_id: identity.user_id.as_str().to_string(),
            username: scoped_username(identity),
            organization: Organization {
                org_id: self.config.organization_id.clone(),
            },
            profile: Profile {
                given_name,
                family_name,
                display_name: identity.display_name.clone(),
            },
            email: EmailField {
                email,
                is_verified: email_verified,
            },
            phone,
            metadata: vec![MetadataEntry {
                key: "routing_key".to_string(),
                value: BASE64.encode(identity.routing_key.as_str()),
            }],
        }
    }
}

#[async_trait]
impl IdentityProvider for ZitadelIdentityProvider {
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserId, DomainError> {
        let url = format!("{}/human", self.config.users_url());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.service_token.expose_secret())
            .json(&self.request_for(identity))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach Zitadel: {}", e);
                DomainError::external(format!("Zitadel unreachable: {}", e))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(DomainError::unique_violation(format!(
                "identity for {} already exists",
                identity.contact.masked()
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %error_text, "Zitadel create user failed");
            return Err(DomainError::external(format!(
                "Zitadel create user returned {}",
                status
            )));
        }

        let body: AddHumanUserResponse = response.json().await.map_err(|e| {
            DomainError::external(format!("Failed to parse Zitadel response: {}", e))
        })?;

        tracing::debug!(user_id = %body.user_id, "Zitadel user created");
        UserId::new(body.user_id)
            .map_err(|e| DomainError::external(format!("Zitadel returned bad user id: {}", e)))
    }

    async fn identity_exists(&self, user_id: &UserId) -> Result<bool, DomainError> {
        let url = format!("{}/{}", self.config.users_url(), user_id.as_str());

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.config.service_token.expose_secret())
            .send()
            .await
            .map_err(|e| DomainError::external(format!("Zitadel unreachable: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            tracing::error!(%user_id, status = status.as_u16(), "Zitadel get user failed");
            return Err(DomainError::external(format!(
                "Zitadel get user returned {}",
                status
            )));
        }
        Ok(true)
    }

    async fn delete_identity(&self, user_id: &UserId) -> Result<(), DomainError> {
        let url = format!("{}/{}", self.config.users_url(), user_id.as_str());

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(self.config.service_token.expose_secret())
            .send()
            .await
            .map_err(|e| DomainError::external(format!("Zitadel unreachable: {}", e)))?;

        let status = response.status();
        // Already gone counts as deleted.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(%user_id, status = status.as_u16(), error = %error_text, "Zitadel delete user failed");
        Err(DomainError::external(format!(
            "Zitadel delete user returned {}",
            status
        )))
    }
}

/// "Dana Ruiz Ortega" → ("Dana", "Ruiz Ortega"). Zitadel requires both.
fn split_name(display_name: &str) -> (String, String) {
    let trimmed = display_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((given, family)) if !family.trim().is_empty() => {
            (given.to_string(), family.trim().to_string())
        }
        _ => (trimmed.to_string(), trimmed.to_string()),
    }
}

fn scoped_username(identity: &NewIdentity) -> String {
    format!(
        "{}:{}",
        identity.routing_key.as_str(),
        identity.contact.as_str()
    )
}

fn placeholder_email(phone: &str, identity: &NewIdentity) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("{}@phone.{}.invalid", digits, identity.routing_key.as_str())
}
