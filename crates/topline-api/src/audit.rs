//! # Audit Recorder
//!
//! Durable, best-effort recording of who attempted what. Recording is
//! fire-and-forget: the request pipeline hands entries to a bounded
//! work queue and never waits on audit I/O, and an audit failure never
//! changes a command's result.
//!
//! ## Queue semantics
//!
//! - Bounded `tokio::sync::mpsc` channel; capacity from configuration.
//! - **Drop-newest** overflow policy: when the queue is full, the entry
//!   being recorded is dropped, WARN-logged, and counted. Entries
//!   already accepted are never evicted.
//! - A single consumer task drains the queue and appends to the sink,
//!   so entries are appended in arrival order (globally, hence also per
//!   caller).
//! - A failed append is attempted exactly once, logged, and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use topline_core::CommandRequest;

/// Request metadata captured at the gateway for audit attribution.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An immutable record of an attempted command.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub caller_id: i64,
    pub caller_email: String,
    /// Method and path, e.g. `POST /api/command/inventory`.
    pub action: String,
    /// Terminal disposition: committed, rolled_back, rejected, failed.
    pub status: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry for a command request with its terminal status.
    pub fn for_request(request: &CommandRequest, status: &str, ctx: &AuditContext) -> Self {
        Self {
            caller_id: request.caller.id,
            caller_email: request.caller.email.clone(),
            action: request.action(),
            status: status.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// An append to the backing audit store failed.
#[derive(Debug, Clone, Error)]
#[error("audit append failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// In-memory sink used in degraded mode and in tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries, in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Handle to the audit work queue. Cheap to clone; all clones feed the
/// same consumer task.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<AuditEntry>,
    dropped: Arc<AtomicU64>,
    append_failures: Arc<AtomicU64>,
}

impl AuditRecorder {
    /// Start the consumer task and return the producer handle.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEntry>(capacity.max(1));
        let append_failures = Arc::new(AtomicU64::new(0));

        let failures = Arc::clone(&append_failures);
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(err) = sink.append(&entry).await {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        caller_id = entry.caller_id,
                        action = %entry.action,
                        error = %err,
                        "audit entry lost: append failed"
                    );
                }
            }
        });

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            append_failures,
        }
    }

    /// Enqueue an entry. Never blocks and never fails from the caller's
    /// perspective; an entry that cannot be queued is counted and
    /// WARN-logged.
    pub fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.try_send(entry) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match err {
                mpsc::error::TrySendError::Full(entry) => {
                    tracing::warn!(
                        caller_id = entry.caller_id,
                        action = %entry.action,
                        "audit queue full — entry dropped"
                    );
                }
                mpsc::error::TrySendError::Closed(entry) => {
                    tracing::error!(
                        caller_id = entry.caller_id,
                        action = %entry.action,
                        "audit consumer gone — entry dropped"
                    );
                }
            }
        }
    }

    /// Entries dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Entries lost because the sink append failed.
    pub fn append_failures(&self) -> u64 {
        self.append_failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("dropped", &self.dropped())
            .field("append_failures", &self.append_failures())
            .finish()
    }
}
