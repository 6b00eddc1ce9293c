//! Audit log persistence — append-only.
//!
//! Every attempted command appends one row to `audit_log`, keyed by an
//! auto-generated id. Rows are never updated or deleted by this
//! service.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::audit::{AuditEntry, AuditError, AuditSink};

/// Postgres-backed audit sink.
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO audit_log (caller_id, caller_email, action, status,
             ip_address, user_agent, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.caller_id)
        .bind(&entry.caller_email)
        .bind(&entry.action)
        .bind(&entry.status)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError(e.to_string()))?;

        Ok(())
    }
}
