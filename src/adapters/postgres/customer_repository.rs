//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{CompanyId, CustomerId, DomainError, RoutingKey, Timestamp};
use crate::domain::tenant::{Customer, PaymentStatus, PriceTier, SubscriptionStatus};
use crate::ports::CustomerRepository;

use super::errors::{corrupt, db_error, versioned_miss};

/// PostgreSQL implementation of the CustomerRepository port.
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a customer.
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    company_id: Option<Uuid>,
    routing_key: String,
    email: Option<String>,
    payment_status: String,
    payment_status_at: Option<i64>,
    subscription_status: Option<String>,
    subscription_status_at: Option<i64>,
    price_tier: Option<String>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    retry_eligible: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            company_id: row.company_id.map(CompanyId::from_uuid),
            routing_key: RoutingKey::new(row.routing_key).map_err(|e| corrupt("routing_key", e))?,
            email: row.email,
            payment_status: row
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt("payment_status", e))?,
            payment_status_at: row.payment_status_at,
            subscription_status: row
                .subscription_status
                .map(|s| s.parse::<SubscriptionStatus>())
                .transpose()
                .map_err(|e| corrupt("subscription_status", e))?,
            subscription_status_at: row.subscription_status_at,
            price_tier: row
                .price_tier
                .map(|s| s.parse::<PriceTier>())
                .transpose()
                .map_err(|e| corrupt("price_tier", e))?,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            retry_eligible: row.retry_eligible,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "id, company_id, routing_key, email, payment_status, \
     payment_status_at, subscription_status, subscription_status_at, price_tier, \
     stripe_customer_id, stripe_subscription_id, retry_eligible, created_at, updated_at, version";

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
        routing_key: &RoutingKey,
    ) -> Result<Option<Customer>, DomainError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE company_id = $1 AND routing_key = $2",
            CUSTOMER_COLUMNS
        );
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(company_id.as_uuid())
            .bind(routing_key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find customer", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<Customer>, DomainError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE stripe_customer_id = $1",
            CUSTOMER_COLUMNS
        );
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(stripe_customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find customer", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn insert(&self, customer: &Customer) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, company_id, routing_key, email, payment_status, payment_status_at,
                subscription_status, subscription_status_at, price_tier, stripe_customer_id,
                stripe_subscription_id, retry_eligible, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.company_id.map(|id| *id.as_uuid()))
        .bind(customer.routing_key.as_str())
        .bind(&customer.email)
        .bind(customer.payment_status.as_str())
        .bind(customer.payment_status_at)
        .bind(customer.subscription_status.map(|s| s.as_str()))
        .bind(customer.subscription_status_at)
        .bind(customer.price_tier.map(|t| t.as_str()))
        .bind(&customer.stripe_customer_id)
        .bind(&customer.stripe_subscription_id)
        .bind(customer.retry_eligible)
        .bind(customer.created_at.as_datetime())
        .bind(customer.updated_at.as_datetime())
        .bind(customer.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert customer", e))?;

        Ok(())
    }

    async fn update(&self, customer: &Customer) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                company_id = $3,
                email = $4,
                payment_status = $5,
                payment_status_at = $6,
                subscription_status = $7,
                subscription_status_at = $8,
                price_tier = $9,
                stripe_customer_id = $10,
                stripe_subscription_id = $11,
                retry_eligible = $12,
                updated_at = $13,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.version)
        .bind(customer.company_id.map(|id| *id.as_uuid()))
        .bind(&customer.email)
        .bind(customer.payment_status.as_str())
        .bind(customer.payment_status_at)
        .bind(customer.subscription_status.map(|s| s.as_str()))
        .bind(customer.subscription_status_at)
        .bind(customer.price_tier.map(|t| t.as_str()))
        .bind(&customer.stripe_customer_id)
        .bind(&customer.stripe_subscription_id)
        .bind(customer.retry_eligible)
        .bind(customer.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update customer", e))?;

        if result.rows_affected() == 0 {
            return Err(
                versioned_miss(&self.pool, "customers", *customer.id.as_uuid(), customer.version)
                    .await,
            );
        }

        Ok(())
    }
}
