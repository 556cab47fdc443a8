//! User profile and company membership records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    CompanyId, ContactAddress, MembershipId, RoutingKey, SignupRequestId, Timestamp, UserId,
    ValidationError,
};

/// One human, keyed by their external identity id.
///
/// `company_id` is fixed at creation. Moving a person to another company is
/// a separate operation outside provisioning, so there is no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub signup_request_id: SignupRequestId,
    pub company_id: CompanyId,
    pub routing_key: RoutingKey,
    pub display_name: String,
    pub contact: ContactAddress,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

/// Role a user holds inside a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
        }
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(MembershipRole::Owner),
            "admin" => Ok(MembershipRole::Admin),
            "member" => Ok(MembershipRole::Member),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// Join record between a user and a company. Revocable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub routing_key: RoutingKey,
    pub role: MembershipRole,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Membership {
    /// The membership every provisioned user gets in their own company.
    pub fn owner_of(profile: &UserProfile, now: Timestamp) -> Self {
        Self {
            id: MembershipId::new(),
            user_id: profile.id.clone(),
            company_id: profile.company_id,
            routing_key: profile.routing_key.clone(),
            role: MembershipRole::Owner,
            created_at: now,
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Revokes the membership. Revoking twice keeps the first timestamp.
    pub fn revoke(&mut self, now: Timestamp) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: UserId::new("zitadel-310").unwrap(),
            signup_request_id: SignupRequestId::new(),
            company_id: CompanyId::new(),
            routing_key: RoutingKey::new("textline").unwrap(),
            display_name: "Dana Ruiz".to_string(),
            contact: ContactAddress::parse("+15551234567").unwrap(),
            email: None,
            created_at: Timestamp::from_unix_secs(1_700_000_000),
        }
    }

    #[test]
    fn owner_membership_links_profile_and_company() {
        let profile = profile();
        let membership = Membership::owner_of(&profile, profile.created_at);
        assert_eq!(membership.user_id, profile.id);
        assert_eq!(membership.company_id, profile.company_id);
        assert_eq!(membership.role, MembershipRole::Owner);
        assert!(membership.is_active());
    }

    #[test]
    fn revoke_keeps_first_timestamp() {
        let profile = profile();
        let mut membership = Membership::owner_of(&profile, profile.created_at);
        let first = profile.created_at.plus_minutes(1);
        membership.revoke(first);
        membership.revoke(first.plus_minutes(5));
        assert_eq!(membership.revoked_at, Some(first));
        assert!(!membership.is_active());
    }

    #[test]
    fn role_parses_storage_value() {
        assert_eq!("owner".parse::<MembershipRole>().unwrap(), MembershipRole::Owner);
        assert!("root".parse::<MembershipRole>().is_err());
    }
}
