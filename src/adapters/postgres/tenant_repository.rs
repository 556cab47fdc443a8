//! PostgreSQL implementation of TenantRepository.
//!
//! Account numbers come from `account_number_sequences`, one row per routing
//! key, incremented atomically with `INSERT ... ON CONFLICT DO UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CompanyId, ContactAddress, DomainError, MembershipId, RoutingKey, SignupRequestId, Timestamp,
    UserId,
};
use crate::domain::tenant::{AccountNumber, Company, Membership, MembershipRole, UserProfile};
use crate::ports::{ProfileCursor, TenantRepository};

use super::errors::{corrupt, db_error};

/// PostgreSQL implementation of the TenantRepository port.
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    routing_key: String,
    name: String,
    account_number: String,
    signup_request_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = DomainError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Company {
            id: CompanyId::from_uuid(row.id),
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
            name: row.name,
            account_number: AccountNumber::try_from(row.account_number)
                .map_err(|e| corrupt("account_number", e))?,
            signup_request_id: SignupRequestId::from_uuid(row.signup_request_id),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: String,
    signup_request_id: Uuid,
    company_id: Uuid,
    routing_key: String,
    display_name: String,
    contact: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: UserId::new(row.id).map_err(|e| corrupt("user_id", e))?,
            signup_request_id: SignupRequestId::from_uuid(row.signup_request_id),
            company_id: CompanyId::from_uuid(row.company_id),
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
            display_name: row.display_name,
            contact: ContactAddress::parse(&row.contact).map_err(|e| corrupt("contact", e))?,
            email: row.email,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    user_id: String,
    company_id: Uuid,
    routing_key: String,
    role: String,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Membership {
            id: MembershipId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            company_id: CompanyId::from_uuid(row.company_id),
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
            role: row.role.parse::<MembershipRole>().map_err(|e| corrupt("role", e))?,
            created_at: Timestamp::from_datetime(row.created_at),
            revoked_at: row.revoked_at.map(Timestamp::from_datetime),
        })
    }
}

const COMPANY_COLUMNS: &str =
    "id, routing_key, name, account_number, signup_request_id, created_at";
const PROFILE_COLUMNS: &str =
    "id, signup_request_id, company_id, routing_key, display_name, contact, email, created_at";

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn next_account_number(
        &self,
        routing_key: &RoutingKey,
    ) -> Result<AccountNumber, DomainError> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO account_number_sequences (routing_key, last_value)
            VALUES ($1, 1)
            ON CONFLICT (routing_key)
            DO UPDATE SET last_value = account_number_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(routing_key.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to allocate account number", e))?;

        Ok(AccountNumber::from_sequence(routing_key, value))
    }

    async fn insert_company(&self, company: &Company) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO companies (id, routing_key, name, account_number, signup_request_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(company.id.as_uuid())
        .bind(company.routing_key.as_str())
        .bind(&company.name)
        .bind(company.account_number.to_string())
        .bind(company.signup_request_id.as_uuid())
        .bind(company.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert company", e))?;

        Ok(())
    }

    async fn delete_company(&self, id: &CompanyId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete company", e))?;

        Ok(())
    }

    async fn find_company(&self, id: &CompanyId) -> Result<Option<Company>, DomainError> {
        let sql = format!("SELECT {} FROM companies WHERE id = $1", COMPANY_COLUMNS);
        let row: Option<CompanyRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find company", e))?;

        row.map(Company::try_from).transpose()
    }

    async fn find_company_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<Company>, DomainError> {
        let sql = format!(
            "SELECT {} FROM companies WHERE signup_request_id = $1",
            COMPANY_COLUMNS
        );
        let row: Option<CompanyRow> = sqlx::query_as(&sql)
            .bind(signup_request_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find company", e))?;

        row.map(Company::try_from).transpose()
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                id, signup_request_id, company_id, routing_key, display_name, contact, email, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(profile.id.as_str())
        .bind(profile.signup_request_id.as_uuid())
        .bind(profile.company_id.as_uuid())
        .bind(profile.routing_key.as_str())
        .bind(&profile.display_name)
        .bind(profile.contact.as_str())
        .bind(&profile.email)
        .bind(profile.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert user profile", e))?;

        Ok(())
    }

    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let sql = format!("SELECT {} FROM user_profiles WHERE id = $1", PROFILE_COLUMNS);
        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find user profile", e))?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn find_profile_by_signup(
        &self,
        signup_request_id: &SignupRequestId,
    ) -> Result<Option<UserProfile>, DomainError> {
        let sql = format!(
            "SELECT {} FROM user_profiles WHERE signup_request_id = $1",
            PROFILE_COLUMNS
        );
        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(signup_request_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find user profile", e))?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, company_id, routing_key, role, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(membership.id.as_uuid())
        .bind(membership.user_id.as_str())
        .bind(membership.company_id.as_uuid())
        .bind(membership.routing_key.as_str())
        .bind(membership.role.as_str())
        .bind(membership.created_at.as_datetime())
        .bind(membership.revoked_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert membership", e))?;

        Ok(())
    }

    async fn find_membership(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Membership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, company_id, routing_key, role, created_at, revoked_at
            FROM memberships
            WHERE user_id = $1 AND company_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(company_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find membership", e))?;

        row.map(Membership::try_from).transpose()
    }

    async fn list_incomplete_profiles(
        &self,
        after: Option<&ProfileCursor>,
        limit: u32,
    ) -> Result<Vec<UserProfile>, DomainError> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.signup_request_id, p.company_id, p.routing_key, p.display_name,
                   p.contact, p.email, p.created_at
            FROM user_profiles p
            WHERE (
                    NOT EXISTS (
                        SELECT 1 FROM memberships m
                        WHERE m.user_id = p.id AND m.company_id = p.company_id
                    )
                    OR NOT EXISTS (
                        SELECT 1 FROM customers c
                        WHERE c.company_id = p.company_id AND c.routing_key = p.routing_key
                    )
                )
              AND ($1::timestamptz IS NULL OR (p.created_at, p.id) > ($1, $2))
            ORDER BY p.created_at, p.id
            LIMIT $3
            "#,
        )
        .bind(after.map(|c| *c.created_at.as_datetime()))
        .bind(after.map(|c| c.user_id.as_str().to_string()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list incomplete profiles", e))?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }
}
