//! Routing key and contact address value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

const MAX_ROUTING_KEY_LEN: usize = 32;

/// Selects which tenant family (brand) a signup, company or lead belongs to.
///
/// Lowercase ASCII slug: letters, digits and `-`, at most 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(ValidationError::empty_field("routing_key"));
        }
        if value.len() > MAX_ROUTING_KEY_LEN {
            return Err(ValidationError::invalid_format(
                "routing_key",
                format!("must be at most {} characters", MAX_ROUTING_KEY_LEN),
            ));
        }
        let valid = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid || value.starts_with('-') || value.ends_with('-') {
            return Err(ValidationError::invalid_format(
                "routing_key",
                "only letters, digits and inner dashes are allowed",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoutingKey> for String {
    fn from(key: RoutingKey) -> Self {
        key.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for a verification code: an E.164 phone number or an email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContactAddress {
    Phone(String),
    Email(String),
}

impl ContactAddress {
    /// Parses and normalises a raw address.
    ///
    /// Phone numbers lose spaces, dashes, dots and parentheses and must then be
    /// `+` followed by 8 to 15 digits. Emails are lowercased.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::empty_field("contact"));
        }

        if raw.contains('@') {
            return parse_email(raw, "contact").map(ContactAddress::Email);
        }

        let compact: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        let digits = compact.strip_prefix('+').ok_or_else(|| {
            ValidationError::invalid_format("contact", "phone numbers must start with +country code")
        })?;
        if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "contact",
                "not a valid E.164 phone number",
            ));
        }
        Ok(ContactAddress::Phone(compact))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContactAddress::Phone(value) | ContactAddress::Email(value) => value,
        }
    }

    pub fn is_phone(&self) -> bool {
        matches!(self, ContactAddress::Phone(_))
    }

    /// The email address, when this contact is one.
    pub fn email(&self) -> Option<&str> {
        match self {
            ContactAddress::Email(value) => Some(value),
            ContactAddress::Phone(_) => None,
        }
    }

    /// Address with the middle elided, safe for logs.
    pub fn masked(&self) -> String {
        let tail: Vec<char> = self.as_str().chars().rev().take(4).collect();
        format!("***{}", tail.into_iter().rev().collect::<String>())
    }
}

/// Validates and lowercases an email address.
pub fn parse_email(raw: &str, field: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::invalid_format(field, "missing @"));
    };
    if local.is_empty() || domain.len() < 3 || !domain.contains('.') || domain.contains('@') {
        return Err(ValidationError::invalid_format(field, "not a valid email address"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format(field, "must not contain spaces"));
    }
    Ok(email)
}

impl TryFrom<String> for ContactAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContactAddress> for String {
    fn from(address: ContactAddress) -> Self {
        match address {
            ContactAddress::Phone(value) | ContactAddress::Email(value) => value,
        }
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_is_lowercased() {
        assert_eq!(RoutingKey::new(" Textline ").unwrap().as_str(), "textline");
    }

    #[test]
    fn routing_key_rejects_invalid_characters() {
        assert!(RoutingKey::new("acme brand").is_err());
        assert!(RoutingKey::new("-acme").is_err());
        assert!(RoutingKey::new("").is_err());
        assert!(RoutingKey::new("a".repeat(33)).is_err());
    }

    #[test]
    fn routing_key_deserialization_validates() {
        let ok: RoutingKey = serde_json::from_str("\"promo-2\"").unwrap();
        assert_eq!(ok.as_str(), "promo-2");
        assert!(serde_json::from_str::<RoutingKey>("\"no spaces\"").is_err());
    }

    #[test]
    fn parses_e164_phone() {
        let address = ContactAddress::parse("+1 (555) 123-4567").unwrap();
        assert_eq!(address, ContactAddress::Phone("+15551234567".to_string()));
        assert!(address.is_phone());
    }

    #[test]
    fn phone_without_country_code_is_rejected() {
        assert!(ContactAddress::parse("555-123-4567").is_err());
        assert!(ContactAddress::parse("+1555").is_err());
        assert!(ContactAddress::parse("+1555abc4567").is_err());
    }

    #[test]
    fn parses_email_lowercased() {
        let address = ContactAddress::parse("Owner@Example.COM").unwrap();
        assert_eq!(address.email(), Some("owner@example.com"));
    }

    #[test]
    fn rejects_broken_email() {
        assert!(ContactAddress::parse("owner@").is_err());
        assert!(ContactAddress::parse("@example.com").is_err());
        assert!(ContactAddress::parse("a@b@c.com").is_err());
    }

    #[test]
    fn masked_keeps_last_four_characters() {
        let address = ContactAddress::parse("+15551234567").unwrap();
        assert_eq!(address.masked(), "***4567");
    }
}
