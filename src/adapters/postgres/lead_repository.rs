//! PostgreSQL implementation of LeadRepository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Lead, LeadStatus};
use crate::domain::foundation::{DomainError, LeadId, RoutingKey, Timestamp};
use crate::ports::LeadRepository;

use super::errors::{corrupt, db_error, versioned_miss};

/// PostgreSQL implementation of the LeadRepository port.
pub struct PostgresLeadRepository {
    pool: PgPool,
}

impl PostgresLeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    email: Option<String>,
    routing_key: String,
    status: String,
    needs_followup: bool,
    checkout_session_id: Option<String>,
    stripe_customer_id: Option<String>,
    subscription_id: Option<String>,
    metadata: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<LeadRow> for Lead {
    type Error = DomainError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: LeadId::from_uuid(row.id),
            email: row.email,
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
            status: row.status.parse::<LeadStatus>().map_err(|e| corrupt("status", e))?,
            needs_followup: row.needs_followup,
            checkout_session_id: row.checkout_session_id,
            stripe_customer_id: row.stripe_customer_id,
            subscription_id: row.subscription_id,
            metadata: row.metadata.0,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

const LEAD_COLUMNS: &str = "id, email, routing_key, status, needs_followup, checkout_session_id, \
     stripe_customer_id, subscription_id, metadata, created_at, updated_at, version";

#[async_trait]
impl LeadRepository for PostgresLeadRepository {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Lead>, DomainError> {
        let sql = format!(
            "SELECT {} FROM leads WHERE checkout_session_id = $1",
            LEAD_COLUMNS
        );
        let row: Option<LeadRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find lead", e))?;

        row.map(Lead::try_from).transpose()
    }

    async fn find_by_email(
        &self,
        email: &str,
        routing_key: &RoutingKey,
    ) -> Result<Option<Lead>, DomainError> {
        let sql = format!(
            "SELECT {} FROM leads WHERE email = $1 AND routing_key = $2",
            LEAD_COLUMNS
        );
        let row: Option<LeadRow> = sqlx::query_as(&sql)
            .bind(email)
            .bind(routing_key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find lead", e))?;

        row.map(Lead::try_from).transpose()
    }

    async fn insert(&self, lead: &Lead) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO leads (
                id, email, routing_key, status, needs_followup, checkout_session_id,
                stripe_customer_id, subscription_id, metadata, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(lead.id.as_uuid())
        .bind(&lead.email)
        .bind(lead.routing_key.as_str())
        .bind(lead.status.as_str())
        .bind(lead.needs_followup)
        .bind(&lead.checkout_session_id)
        .bind(&lead.stripe_customer_id)
        .bind(&lead.subscription_id)
        .bind(Json(&lead.metadata))
        .bind(lead.created_at.as_datetime())
        .bind(lead.updated_at.as_datetime())
        .bind(lead.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert lead", e))?;

        Ok(())
    }

    async fn update(&self, lead: &Lead) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE leads SET
                email = $3,
                status = $4,
                needs_followup = $5,
                checkout_session_id = $6,
                stripe_customer_id = $7,
                subscription_id = $8,
                metadata = $9,
                updated_at = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(lead.id.as_uuid())
        .bind(lead.version)
        .bind(&lead.email)
        .bind(lead.status.as_str())
        .bind(lead.needs_followup)
        .bind(&lead.checkout_session_id)
        .bind(&lead.stripe_customer_id)
        .bind(&lead.subscription_id)
        .bind(Json(&lead.metadata))
        .bind(lead.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update lead", e))?;

        if result.rows_affected() == 0 {
            return Err(versioned_miss(&self.pool, "leads", *lead.id.as_uuid(), lead.version).await);
        }

        Ok(())
    }
}
