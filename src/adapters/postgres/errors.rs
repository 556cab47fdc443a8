//! Error mapping shared by the PostgreSQL repositories.

use std::fmt::Display;

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Maps a sqlx error, keeping unique violations distinguishable.
pub(super) fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return DomainError::unique_violation(format!("{}: duplicate key violates {}", context, constraint))
                .with_detail("constraint", constraint);
        }
    }
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

/// A stored value that no longer parses into its domain type.
pub(super) fn corrupt(field: &str, err: impl Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in database: {}", field, err),
    )
}

/// Explains why a versioned `UPDATE ... WHERE id = $1 AND version = $n`
/// touched no rows.
pub(super) async fn versioned_miss(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
    expected_version: i64,
) -> DomainError {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table);
    match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(pool).await {
        Ok(true) => DomainError::concurrency_conflict(format!(
            "{} row {} changed since version {}",
            table, id, expected_version
        )),
        Ok(false) => DomainError::new(ErrorCode::NotFound, format!("{} row {} not found", table, id)),
        Err(e) => db_error("Failed to check row", e),
    }
}
