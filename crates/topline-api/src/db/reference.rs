//! Reference-data lookups for the command validator.
//!
//! Read-only queries against reference tables, exposed through the
//! `ReferenceReader` seam so the validator stays free of database
//! types. These reads run outside the command transaction; handlers
//! re-check stock under row locks, so a race here surfaces as a 409
//! rather than a lost update.

use async_trait::async_trait;
use sqlx::PgPool;
use topline_core::validate::{ReferenceError, ReferenceReader};

/// Postgres-backed reference reader. Always answers.
pub struct PgReferenceReader {
    pool: PgPool,
}

impl PgReferenceReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceReader for PgReferenceReader {
    async fn lot_exists(&self, lot_number: &str) -> Result<Option<bool>, ReferenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM production_orders WHERE lot_number = $1)",
        )
        .bind(lot_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ReferenceError(e.to_string()))?;

        Ok(Some(exists))
    }

    async fn location_exists(&self, code: &str) -> Result<Option<bool>, ReferenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM inventory_locations WHERE location_code = $1 AND active)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ReferenceError(e.to_string()))?;

        Ok(Some(exists))
    }

    async fn available_stock(
        &self,
        part_number: &str,
        location_code: &str,
    ) -> Result<Option<f64>, ReferenceError> {
        let available: Option<f64> = sqlx::query_scalar(
            "SELECT available_quantity FROM inventory_balances
             WHERE part_number = $1 AND location_code = $2",
        )
        .bind(part_number)
        .bind(location_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReferenceError(e.to_string()))?;

        // No balance row means no stock has ever been at this location.
        Ok(Some(available.unwrap_or(0.0)))
    }
}
