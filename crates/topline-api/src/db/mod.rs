//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx. The database is **optional**: when
//! `DATABASE_URL` is set, commands execute inside real transactions and
//! the audit log is durable. When absent, the service runs in degraded
//! mode — probes work, commands fail with 503, audit falls back to an
//! in-memory sink.
//!
//! The pool is the only shared mutable resource in the service:
//! `max_connections` bounds concurrency, and `acquire_timeout` turns
//! overload into an explicit pool error instead of unbounded queueing.

pub mod audit;
pub mod reference;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppConfig;

/// Initialize the connection pool and run embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (degraded mode).
/// Returns `Err` if the URL is set but the connection or a migration
/// fails.
pub async fn init_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in degraded mode. \
                 Commands will fail with 503 and audit entries are not durable."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
