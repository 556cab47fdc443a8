//! Records the unit tests seed into an [`InMemoryStore`].

use std::sync::Arc;

use crate::domain::foundation::{ContactAddress, RoutingKey, SignupRequestId, Timestamp, UserId};
use crate::domain::signup::{SignupFields, SignupPolicy, SignupRequest, VerificationCode};
use crate::domain::tenant::{Company, UserProfile};
use crate::ports::{SignupRepository, TenantRepository};

use super::{InMemoryStore, ManualClock};

/// Start of every test clock.
pub const T0: i64 = 1_700_000_000;

/// Code stored on signups built here.
pub const CODE: &str = "482913";

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at(Timestamp::from_unix_secs(T0)))
}

/// A "textline" signup for Ruiz Plumbing awaiting [`CODE`].
pub fn signup_request(contact: &str, email: Option<&str>) -> SignupRequest {
    SignupRequest::create(
        SignupFields::new("Dana Ruiz", Some("Ruiz Plumbing"), contact, email, "textline").unwrap(),
        VerificationCode::from_stored(CODE).unwrap(),
        &SignupPolicy::default(),
        Timestamp::from_unix_secs(T0),
    )
}

pub async fn stored_signup(store: &InMemoryStore, contact: &str) -> SignupRequest {
    let request = signup_request(contact, None);
    SignupRepository::insert(store, &request).await.unwrap();
    request
}

pub async fn stored_company(store: &InMemoryStore, created: i64) -> Company {
    let key = RoutingKey::new("textline").unwrap();
    let number = store.next_account_number(&key).await.unwrap();
    let company = Company::new(
        key,
        "Ruiz Plumbing",
        number,
        SignupRequestId::new(),
        Timestamp::from_unix_secs(created),
    );
    store.insert_company(&company).await.unwrap();
    company
}

/// Company and profile with neither membership nor billing customer.
pub async fn bare_tenant(store: &InMemoryStore, user: &str, created: i64) -> UserProfile {
    let company = stored_company(store, created).await;
    let profile = UserProfile {
        id: UserId::new(user).unwrap(),
        signup_request_id: company.signup_request_id,
        company_id: company.id,
        routing_key: company.routing_key.clone(),
        display_name: "Dana Ruiz".to_string(),
        contact: ContactAddress::parse("owner@ruizplumbing.test").unwrap(),
        email: Some("owner@ruizplumbing.test".to_string()),
        created_at: company.created_at,
    };
    store.insert_profile(&profile).await.unwrap();
    profile
}
