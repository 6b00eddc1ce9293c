//! # Command Dispatcher
//!
//! Routes a validated, authenticated command to its domain handler and
//! wraps the handler in a transaction scoped to exactly one request.
//!
//! ## Registry
//!
//! Handlers are a polymorphic set keyed by [`ResourceKind`], resolved
//! at startup. [`HandlerRegistry::verify_complete`] turns a missing
//! registration into a startup configuration error instead of a
//! runtime 404 deep in dispatch.
//!
//! ## Transaction discipline
//!
//! One transaction per command, at most. Handler success commits;
//! any handler error triggers rollback. An unanticipated error follows
//! the same path: rollback is always attempted, then the failure
//! surfaces as a 500-class transaction error.
//!
//! The transaction block runs in its own task: a caller disconnect
//! drops the request future, but the command still reaches a
//! deterministic commit or rollback, and its audit entry — emitted from
//! the same task after the result is determined — still proceeds.
//!
//! ## Idempotency
//!
//! When the request carries an `Idempotency-Key` header, a committed
//! result is cached per `(caller id, key)`. Replaying the key returns
//! the cached result without opening a transaction; failed results are
//! not cached so a retry can succeed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use topline_core::{CommandResult, CommandStatus, FailureKind, ResourceKind, ValidatedCommand};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEntry};
use crate::handlers;
use crate::state::AppState;

// ── Handler seam ────────────────────────────────────────────────────

/// Error raised by a domain handler inside its transaction.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The command conflicts with current state (insufficient stock,
    /// duplicate lot, unknown or terminal record). Rolls back, 409.
    #[error("{0}")]
    Conflict(String),

    /// A query inside the transaction failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A validated command failed an internal consistency check.
    #[error("internal handler error: {0}")]
    Internal(String),
}

/// A domain handler for one resource kind. Executes fully inside the
/// per-request transaction and returns the id of the created or
/// affected record.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cmd: &ValidatedCommand,
    ) -> Result<Uuid, HandlerError>;
}

// ── Registry ────────────────────────────────────────────────────────

/// Startup configuration error: resource kinds without a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError {
    pub missing: Vec<ResourceKind>,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self
            .missing
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "no command handler registered for: {names}")
    }
}

impl std::error::Error for RegistryError {}

/// The handler set, keyed by resource kind and resolved at startup.
pub struct HandlerRegistry {
    handlers: HashMap<ResourceKind, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// An empty registry. Used by tests that register selectively.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in handler set covering every resource kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(
            ResourceKind::Production,
            Arc::new(handlers::production::ProductionHandler),
        );
        registry.register(
            ResourceKind::QualityControl,
            Arc::new(handlers::quality_control::QcHandler),
        );
        registry.register(
            ResourceKind::Inventory,
            Arc::new(handlers::inventory::InventoryHandler),
        );
        registry.register(
            ResourceKind::Warehouse,
            Arc::new(handlers::warehouse::WarehouseHandler),
        );
        registry
    }

    /// Register a handler for a resource kind.
    pub fn register(&mut self, kind: ResourceKind, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Look up the handler for a resource kind.
    pub fn resolve(&self, kind: ResourceKind) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Fail startup if any resource kind lacks a handler.
    pub fn verify_complete(&self) -> Result<(), RegistryError> {
        let missing: Vec<ResourceKind> = ResourceKind::ALL
            .into_iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError { missing })
        }
    }
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Dispatch a validated command and return its terminal result.
///
/// Exactly one audit entry is recorded per call, whatever the outcome.
pub async fn dispatch(
    state: &AppState,
    cmd: ValidatedCommand,
    idempotency_key: Option<String>,
    audit_ctx: AuditContext,
) -> CommandResult {
    // Idempotent replay: same result, no double-applied effects. The
    // replayed attempt is still audited.
    if let Some(key) = &idempotency_key {
        let cache_key = (cmd.request.caller.id, key.clone());
        if let Some(prior) = state.idempotency.get(&cache_key) {
            tracing::info!(
                caller_id = cmd.request.caller.id,
                action = %cmd.request.action(),
                "idempotent replay — returning cached result"
            );
            state.audit.record(AuditEntry::for_request(
                &cmd.request,
                prior.audit_status(),
                &audit_ctx,
            ));
            return prior;
        }
    }

    let Some(pool) = state.db_pool.clone() else {
        let result = CommandResult::failed(FailureKind::Unavailable, "database not configured");
        state.audit.record(AuditEntry::for_request(
            &cmd.request,
            result.audit_status(),
            &audit_ctx,
        ));
        return result;
    };

    let registry = Arc::clone(&state.registry);
    let audit = state.audit.clone();
    let idempotency = state.idempotency.clone();

    let task = tokio::spawn(async move {
        let result = run_in_transaction(&pool, &registry, &cmd).await;
        audit.record(AuditEntry::for_request(
            &cmd.request,
            result.audit_status(),
            &audit_ctx,
        ));
        if result.status == CommandStatus::Success {
            if let Some(key) = idempotency_key {
                idempotency.insert((cmd.request.caller.id, key), result.clone());
            }
        }
        result
    });

    match task.await {
        Ok(result) => result,
        Err(err) => {
            // The task panicked; dropping the transaction rolled it back.
            tracing::error!(error = %err, "command task aborted");
            CommandResult::failed(FailureKind::Transaction, "command execution aborted")
        }
    }
}

/// Open the transaction, run the handler, commit or roll back.
async fn run_in_transaction(
    pool: &PgPool,
    registry: &HandlerRegistry,
    cmd: &ValidatedCommand,
) -> CommandResult {
    let Some(handler) = registry.resolve(cmd.request.resource) else {
        // verify_complete() at startup makes this unreachable.
        tracing::error!(resource = %cmd.request.resource, "no handler registered");
        return CommandResult::failed(
            FailureKind::Transaction,
            "no handler registered for resource",
        );
    };

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(error = %err, "failed to open transaction");
            return CommandResult::failed(FailureKind::Transaction, "could not open transaction");
        }
    };

    match handler.apply(&mut tx, cmd).await {
        Ok(resource_id) => match tx.commit().await {
            Ok(()) => CommandResult::success(resource_id),
            Err(err) => {
                tracing::error!(error = %err, "transaction commit failed");
                CommandResult::failed(FailureKind::Transaction, "transaction commit failed")
            }
        },
        Err(HandlerError::Conflict(message)) => {
            roll_back(tx).await;
            CommandResult::failed(FailureKind::Conflict, message)
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                resource = %cmd.request.resource,
                "command handler failed"
            );
            roll_back(tx).await;
            CommandResult::failed(FailureKind::Transaction, "command failed and was rolled back")
        }
    }
}

async fn roll_back(tx: Transaction<'_, Postgres>) {
    if let Err(err) = tx.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}
