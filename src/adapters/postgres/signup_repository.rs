//! PostgreSQL implementation of SignupRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    ContactAddress, DomainError, RoutingKey, SignupRequestId, Timestamp,
};
use crate::domain::signup::{SignupFields, SignupRequest, SignupState, VerificationCode};
use crate::ports::SignupRepository;

use super::errors::{corrupt, db_error, versioned_miss};

/// PostgreSQL implementation of the SignupRepository port.
pub struct PostgresSignupRepository {
    pool: PgPool,
}

impl PostgresSignupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a signup request.
#[derive(Debug, sqlx::FromRow)]
struct SignupRow {
    id: Uuid,
    display_name: String,
    company_name: Option<String>,
    contact: String,
    email: Option<String>,
    routing_key: String,
    code: Option<String>,
    state: String,
    attempts: i32,
    max_attempts: i32,
    resend_count: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SignupRow> for SignupRequest {
    type Error = DomainError;

    fn try_from(row: SignupRow) -> Result<Self, Self::Error> {
        let fields = SignupFields {
            display_name: row.display_name,
            company_name: row.company_name,
            contact: ContactAddress::parse(&row.contact).map_err(|e| corrupt("contact", e))?,
            email: row.email,
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
        };
        let code = row
            .code
            .map(VerificationCode::from_stored)
            .transpose()
            .map_err(|e| corrupt("code", e))?;

        Ok(SignupRequest {
            id: SignupRequestId::from_uuid(row.id),
            fields,
            code,
            state: row.state.parse::<SignupState>().map_err(|e| corrupt("state", e))?,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("attempts", e))?,
            max_attempts: u32::try_from(row.max_attempts).map_err(|e| corrupt("max_attempts", e))?,
            resend_count: u32::try_from(row.resend_count).map_err(|e| corrupt("resend_count", e))?,
            created_at: Timestamp::from_datetime(row.created_at),
            expires_at: Timestamp::from_datetime(row.expires_at),
            verified_at: row.verified_at.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl SignupRepository for PostgresSignupRepository {
    async fn insert(&self, request: &SignupRequest) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO signup_requests (
                id, display_name, company_name, contact, email, routing_key, code, state,
                attempts, max_attempts, resend_count, created_at, expires_at, verified_at,
                updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(&request.fields.display_name)
        .bind(&request.fields.company_name)
        .bind(request.fields.contact.as_str())
        .bind(&request.fields.email)
        .bind(request.fields.routing_key.as_str())
        .bind(request.code.as_ref().map(VerificationCode::expose))
        .bind(request.state.as_str())
        .bind(count(request.attempts))
        .bind(count(request.max_attempts))
        .bind(count(request.resend_count))
        .bind(request.created_at.as_datetime())
        .bind(request.expires_at.as_datetime())
        .bind(request.verified_at.map(|t| *t.as_datetime()))
        .bind(request.updated_at.as_datetime())
        .bind(request.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert signup request", e))?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SignupRequestId,
    ) -> Result<Option<SignupRequest>, DomainError> {
        let row: Option<SignupRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, company_name, contact, email, routing_key, code, state,
                   attempts, max_attempts, resend_count, created_at, expires_at, verified_at,
                   updated_at, version
            FROM signup_requests
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find signup request", e))?;

        row.map(SignupRequest::try_from).transpose()
    }

    async fn update(&self, request: &SignupRequest) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE signup_requests SET
                code = $3,
                state = $4,
                attempts = $5,
                resend_count = $6,
                expires_at = $7,
                verified_at = $8,
                updated_at = $9,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.version)
        .bind(request.code.as_ref().map(VerificationCode::expose))
        .bind(request.state.as_str())
        .bind(count(request.attempts))
        .bind(count(request.resend_count))
        .bind(request.expires_at.as_datetime())
        .bind(request.verified_at.map(|t| *t.as_datetime()))
        .bind(request.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update signup request", e))?;

        if result.rows_affected() == 0 {
            return Err(versioned_miss(
                &self.pool,
                "signup_requests",
                *request.id.as_uuid(),
                request.version,
            )
            .await);
        }

        Ok(())
    }
}
