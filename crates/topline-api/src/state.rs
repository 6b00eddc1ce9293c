//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Built once at startup and injected — no
//! module-level singletons.
//!
//! ## What lives here
//!
//! - **Configuration** — parsed from the environment once at startup.
//! - **Database pool** — optional; absent means degraded mode where
//!   commands fail with 503 but the service still serves probes.
//! - **Handler registry** — resolved and completeness-checked at startup.
//! - **Audit recorder** — bounded queue handle, cheap to clone.
//! - **Idempotency cache** — terminal command results keyed by
//!   `(caller id, idempotency key)`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use topline_core::CommandResult;

use crate::audit::{AuditRecorder, AuditSink, MemoryAuditSink};
use crate::db::audit::PgAuditSink;
use crate::dispatch::HandlerRegistry;

// ── Secrets ─────────────────────────────────────────────────────────

/// A secret value whose `Debug` output is redacted to prevent
/// credential leakage in logs.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Service configuration, parsed from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// HS256 signing key for bearer tokens. `None` disables
    /// authentication (development mode).
    pub jwt_secret: Option<SecretString>,
    /// Maximum accepted request body size in bytes.
    pub body_limit_bytes: usize,
    /// Rate limit: maximum requests per caller per window.
    pub rate_limit_max_requests: u64,
    /// Rate limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Maximum concurrent connections in the database pool.
    pub db_max_connections: u32,
    /// How long a request waits for a pool connection before failing.
    pub db_acquire_timeout_secs: u64,
    /// Bound of the audit work queue.
    pub audit_queue_capacity: usize,
    /// Where read traffic is redirected (the query-side service).
    pub query_service_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3108,
            jwt_secret: None,
            body_limit_bytes: 2 * 1024 * 1024,
            rate_limit_max_requests: 1000,
            rate_limit_window_secs: 60,
            db_max_connections: 20,
            db_acquire_timeout_secs: 5,
            audit_queue_capacity: 1024,
            query_service_url: "http://localhost:2025".to_string(),
        }
    }
}

impl AppConfig {
    /// Build configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT", defaults.port),
            jwt_secret: std::env::var("JWT_SECRET").ok().map(SecretString::new),
            body_limit_bytes: env_parse("BODY_LIMIT_BYTES", defaults.body_limit_bytes),
            rate_limit_max_requests: env_parse(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window_secs: env_parse(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_acquire_timeout_secs: env_parse(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout_secs,
            ),
            audit_queue_capacity: env_parse("AUDIT_QUEUE_CAPACITY", defaults.audit_queue_capacity),
            query_service_url: std::env::var("QUERY_SERVICE_URL")
                .unwrap_or(defaults.query_service_url),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Generic in-memory store ─────────────────────────────────────────

/// Thread-safe, cloneable in-memory key-value store.
///
/// Operations are synchronous (`parking_lot::RwLock`, never held across
/// `.await` points) and the lock is non-poisonable. Used for the
/// idempotency cache.
#[derive(Debug)]
pub struct Store<K: Eq + Hash + Clone, T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: T) -> Option<T> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Idempotency cache key: `(caller id, Idempotency-Key header value)`.
pub type IdempotencyKey = (i64, String);

// ── AppState ────────────────────────────────────────────────────────

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: Option<PgPool>,
    pub registry: Arc<HandlerRegistry>,
    pub audit: AuditRecorder,
    pub idempotency: Store<IdempotencyKey, CommandResult>,
}

impl AppState {
    /// State with default configuration and no database — degraded mode,
    /// suitable for tests.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Build state from configuration and an optional pool. The audit
    /// sink is the database when a pool is present, in-memory otherwise.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let sink: Arc<dyn AuditSink> = match &db_pool {
            Some(pool) => Arc::new(PgAuditSink::new(pool.clone())),
            None => Arc::new(MemoryAuditSink::new()),
        };
        Self::with_audit_sink(config, db_pool, sink)
    }

    /// Build state with an explicit audit sink. Tests use this to share
    /// a [`MemoryAuditSink`] handle with the assertion side.
    pub fn with_audit_sink(
        config: AppConfig,
        db_pool: Option<PgPool>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let audit = AuditRecorder::spawn(sink, config.audit_queue_capacity);
        Self {
            config,
            db_pool,
            registry: Arc::new(HandlerRegistry::builtin()),
            audit,
            idempotency: Store::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
