//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresSignupRepository` - Signup requests with versioned writes
//! - `PostgresTenantRepository` - Companies, profiles, memberships, account numbers
//! - `PostgresCustomerRepository` - Local billing records
//! - `PostgresLeadRepository` - Checkout leads
//! - `PostgresWebhookEventRepository` - Stripe event ledger
//!
//! Schema lives in `migrations/`. Unique violations surface as
//! `ErrorCode::UniqueViolation` with the constraint name in the `constraint`
//! detail; stale versioned writes as `ErrorCode::ConcurrencyConflict`.

mod customer_repository;
mod errors;
mod lead_repository;
mod signup_repository;
mod tenant_repository;
mod webhook_event_repository;

pub use customer_repository::PostgresCustomerRepository;
pub use lead_repository::PostgresLeadRepository;
pub use signup_repository::PostgresSignupRepository;
pub use tenant_repository::PostgresTenantRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;

/// Embedded migrations, run at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
