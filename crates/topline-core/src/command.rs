//! # Command Envelope
//!
//! The write-side request and result types. A [`CommandRequest`] is
//! constructed once per inbound HTTP call and is read-only afterwards;
//! a [`CommandResult`] is terminal and returned to the gateway exactly
//! once per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::identity::CallerIdentity;
use crate::validate::{FieldViolation, ValidationError};

/// State-mutating HTTP methods admitted by the command gateway.
///
/// Read methods never reach the pipeline — the gateway rejects them at
/// the CQRS boundary and points callers at the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    Post,
    Put,
    Patch,
    Delete,
}

impl WriteMethod {
    /// Return the HTTP method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse an HTTP method name. Returns `None` for read methods.
    pub fn from_method_str(s: &str) -> Option<Self> {
        match s {
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four resource families served by the command endpoints.
///
/// Adding a resource type means adding a variant here and registering a
/// handler for it — the dispatcher itself does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Production,
    QualityControl,
    Inventory,
    Warehouse,
}

impl ResourceKind {
    /// All resource kinds, in registration order.
    pub const ALL: [ResourceKind; 4] = [
        Self::Production,
        Self::QualityControl,
        Self::Inventory,
        Self::Warehouse,
    ];

    /// Return the URL path segment for this resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::QualityControl => "quality-control",
            Self::Inventory => "inventory",
            Self::Warehouse => "warehouse",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "quality-control" => Ok(Self::QualityControl),
            "inventory" => Ok(Self::Inventory),
            "warehouse" => Ok(Self::Warehouse),
            other => Err(UnknownResource(other.to_string())),
        }
    }
}

/// Error for an unrecognized resource path segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command resource '{0}' — expected one of: production, quality-control, inventory, warehouse")]
pub struct UnknownResource(pub String);

/// A write request, constructed once per inbound call.
///
/// Read-only after construction. Every `CommandRequest` that reaches
/// the dispatcher carries a verified caller identity and has passed
/// validation for its method.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub method: WriteMethod,
    pub resource: ResourceKind,
    pub payload: serde_json::Value,
    pub caller: CallerIdentity,
    pub received_at: DateTime<Utc>,
}

impl CommandRequest {
    /// The audit action string for this request, e.g.
    /// `POST /api/command/inventory`.
    pub fn action(&self) -> String {
        format!("{} /api/command/{}", self.method, self.resource)
    }
}

/// Terminal status of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// The transaction committed.
    Success,
    /// The command never opened a transaction (validation failure).
    Rejected,
    /// A transaction was opened and rolled back, or could not be opened.
    Failed,
}

/// Classification of a rejected or failed command, surfaced to callers
/// as a machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One or more field-level violations.
    Validation,
    /// The command conflicts with current state (insufficient stock,
    /// duplicate lot, unknown record).
    Conflict,
    /// The transaction could not be opened, committed, or the handler
    /// raised an unanticipated error; rollback was attempted.
    Transaction,
    /// The backing store is not configured or not reachable.
    Unavailable,
}

/// Error details attached to a rejected or failed [`CommandResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
    /// Field-level violations, present for validation failures so the
    /// caller can fix every issue at once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<FieldViolation>>,
}

/// The terminal result of a command, produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommandResult {
    pub status: CommandStatus,
    /// Identifier of the created or affected record, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl CommandResult {
    /// A committed result carrying the affected record's id.
    pub fn success(resource_id: Uuid) -> Self {
        Self {
            status: CommandStatus::Success,
            resource_id: Some(resource_id),
            error: None,
        }
    }

    /// A rejected result — no transaction was opened.
    pub fn rejected(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Rejected,
            resource_id: None,
            error: Some(FailureInfo {
                kind,
                message: message.into(),
                violations: None,
            }),
        }
    }

    /// A rejected result carrying every violated field.
    pub fn invalid(err: &ValidationError) -> Self {
        Self {
            status: CommandStatus::Rejected,
            resource_id: None,
            error: Some(FailureInfo {
                kind: FailureKind::Validation,
                message: err.to_string(),
                violations: Some(err.violations.clone()),
            }),
        }
    }

    /// A failed result — the transaction rolled back or never opened.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failed,
            resource_id: None,
            error: Some(FailureInfo {
                kind,
                message: message.into(),
                violations: None,
            }),
        }
    }

    /// Audit log status string for this result.
    ///
    /// `rolled_back` is reserved for results where a transaction was
    /// opened; a command that failed because the backing store is
    /// unavailable never opened one and records as `failed`.
    pub fn audit_status(&self) -> &'static str {
        match (self.status, self.error.as_ref().map(|e| e.kind)) {
            (CommandStatus::Success, _) => "committed",
            (CommandStatus::Rejected, _) => "rejected",
            (CommandStatus::Failed, Some(FailureKind::Unavailable)) => "failed",
            (CommandStatus::Failed, _) => "rolled_back",
        }
    }
}
