//! # Command Validation
//!
//! Per-resource validation rules for write requests. A validation pass
//! collects every violated field into one [`ValidationError`] so the
//! caller can fix all issues at once.
//!
//! Two phases run over each payload:
//!
//! 1. **Shape rules** — field presence, ranges, and enumerated values,
//!    relaxed per method (DELETE needs only the identifying fields).
//! 2. **Reference rules** — cross-field checks against read-only
//!    reference data (lot existence, location existence, stock levels)
//!    through the injected [`ReferenceReader`]. A reader may answer
//!    `None` ("unknown") for any lookup; that check is then skipped.
//!
//! No side effects: reference lookups are reads owned by the caller's
//! store, not by this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::command::{CommandRequest, ResourceKind, WriteMethod};

/// Valid production order statuses, canonical form.
pub const ORDER_STATUSES: [&str; 5] = [
    "PLANNED",
    "RELEASED",
    "IN_PROGRESS",
    "COMPLETED",
    "CANCELLED",
];

/// Valid quality-control inspection results.
pub const QC_RESULTS: [&str; 3] = ["pass", "fail", "rework"];

/// Valid stock types for warehouse adjustments.
pub const STOCK_TYPES: [&str; 3] = ["fg", "wip", "raw"];

// ── Violations ──────────────────────────────────────────────────────

/// A single violated field with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Validation failure enumerating every violated field in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for ValidationError {}

// ── Reference data seam ─────────────────────────────────────────────

/// A reference-data lookup failed at the backing store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("reference lookup failed: {0}")]
pub struct ReferenceError(pub String);

/// Read-only reference-data lookups needed for cross-field checks.
///
/// `Ok(None)` means the reader cannot answer (reference data
/// unavailable); the corresponding check is skipped. The Postgres-backed
/// reader in the API layer always answers.
#[async_trait]
pub trait ReferenceReader: Send + Sync {
    /// Whether a production lot with this number exists.
    async fn lot_exists(&self, lot_number: &str) -> Result<Option<bool>, ReferenceError>;

    /// Whether an inventory location with this code exists.
    async fn location_exists(&self, code: &str) -> Result<Option<bool>, ReferenceError>;

    /// Available (unreserved) stock of a part at a location.
    async fn available_stock(
        &self,
        part_number: &str,
        location_code: &str,
    ) -> Result<Option<f64>, ReferenceError>;
}

/// A reader that answers "unknown" to every lookup, skipping all
/// reference checks. Used when no backing store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReferenceReader;

#[async_trait]
impl ReferenceReader for NullReferenceReader {
    async fn lot_exists(&self, _lot_number: &str) -> Result<Option<bool>, ReferenceError> {
        Ok(None)
    }

    async fn location_exists(&self, _code: &str) -> Result<Option<bool>, ReferenceError> {
        Ok(None)
    }

    async fn available_stock(
        &self,
        _part_number: &str,
        _location_code: &str,
    ) -> Result<Option<f64>, ReferenceError> {
        Ok(None)
    }
}

// ── Payloads ────────────────────────────────────────────────────────

/// Production job order command.
///
/// `lot_number` identifies the order for every method; the remaining
/// fields are required per method by the shape rules.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductionCommand {
    pub lot_number: Option<String>,
    pub part_number: Option<String>,
    /// Quantity to produce. Must be positive when present.
    pub quantity: Option<f64>,
    /// Target status for updates: PLANNED, RELEASED, IN_PROGRESS,
    /// COMPLETED, CANCELLED.
    pub status: Option<String>,
}

/// Quality-control inspection command.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QcCommand {
    pub lot_number: Option<String>,
    /// Inspection result: pass, fail, rework.
    pub result: Option<String>,
    pub quantity_inspected: Option<f64>,
    pub notes: Option<String>,
}

/// Inventory stock movement command.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryMoveCommand {
    pub part_number: Option<String>,
    pub source_location: Option<String>,
    pub dest_location: Option<String>,
    pub quantity: Option<f64>,
    /// Movement to void; required for DELETE.
    pub movement_number: Option<String>,
}

/// Warehouse stock adjustment command.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustmentCommand {
    pub part_number: Option<String>,
    /// Stock bucket being adjusted: fg, wip, raw.
    pub stock_type: Option<String>,
    /// Signed adjustment. Must be non-zero.
    pub adjustment_quantity: Option<f64>,
    pub reason: Option<String>,
    /// Adjustment to amend or void; required for PUT/PATCH/DELETE.
    pub adjustment_number: Option<String>,
}

/// A typed, validated command payload, tagged by resource kind.
#[derive(Debug, Clone)]
pub enum CommandPayload {
    Production(ProductionCommand),
    QualityControl(QcCommand),
    Inventory(InventoryMoveCommand),
    Warehouse(StockAdjustmentCommand),
}

/// A command that has passed validation for its method, ready for
/// dispatch.
#[derive(Debug, Clone)]
pub struct ValidatedCommand {
    pub request: CommandRequest,
    pub payload: CommandPayload,
}

/// Failure modes of [`validate`]: field violations, or an inability to
/// consult reference data at all.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

// ── Validation entry point ──────────────────────────────────────────

/// Validate a command request against its resource's rules.
///
/// Shape rules run first, then reference-data rules; violations from
/// both phases are reported together.
pub async fn validate(
    request: CommandRequest,
    reader: &dyn ReferenceReader,
) -> Result<ValidatedCommand, ValidateError> {
    let mut violations = Vec::new();

    let payload = match request.resource {
        ResourceKind::Production => {
            let cmd = deserialize::<ProductionCommand>(&request.payload, &mut violations);
            if let Some(ref cmd) = cmd {
                production_shape(cmd, request.method, &mut violations);
            }
            cmd.map(CommandPayload::Production)
        }
        ResourceKind::QualityControl => {
            let cmd = deserialize::<QcCommand>(&request.payload, &mut violations);
            if let Some(ref cmd) = cmd {
                qc_shape(cmd, request.method, &mut violations);
                qc_reference(cmd, reader, &mut violations).await?;
            }
            cmd.map(CommandPayload::QualityControl)
        }
        ResourceKind::Inventory => {
            let cmd = deserialize::<InventoryMoveCommand>(&request.payload, &mut violations);
            if let Some(ref cmd) = cmd {
                inventory_shape(cmd, request.method, &mut violations);
                if request.method == WriteMethod::Post {
                    inventory_reference(cmd, reader, &mut violations).await?;
                }
            }
            cmd.map(CommandPayload::Inventory)
        }
        ResourceKind::Warehouse => {
            let cmd = deserialize::<StockAdjustmentCommand>(&request.payload, &mut violations);
            if let Some(ref cmd) = cmd {
                warehouse_shape(cmd, request.method, &mut violations);
            }
            cmd.map(CommandPayload::Warehouse)
        }
    };

    match payload {
        Some(payload) if violations.is_empty() => Ok(ValidatedCommand { request, payload }),
        _ => Err(ValidationError { violations }.into()),
    }
}

/// Deserialize the raw payload, recording a violation on failure.
fn deserialize<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
    violations: &mut Vec<FieldViolation>,
) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            violations.push(FieldViolation::new("payload", e.to_string()));
            None
        }
    }
}

// ── Shape rules ─────────────────────────────────────────────────────

fn require_str(
    value: &Option<String>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> bool {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => true,
        Some(_) => {
            violations.push(FieldViolation::new(field, "must not be empty"));
            false
        }
        None => {
            violations.push(FieldViolation::new(field, "is required"));
            false
        }
    }
}

fn check_positive(value: Option<f64>, field: &str, violations: &mut Vec<FieldViolation>) {
    if let Some(q) = value {
        if !q.is_finite() || q <= 0.0 {
            violations.push(FieldViolation::new(field, "must be a positive number"));
        }
    }
}

fn check_one_of(
    value: &Option<String>,
    field: &str,
    allowed: &[&str],
    violations: &mut Vec<FieldViolation>,
) {
    if let Some(v) = value.as_deref() {
        if !allowed.contains(&v) {
            violations.push(FieldViolation::new(
                field,
                format!("must be one of: {}", allowed.join(", ")),
            ));
        }
    }
}

fn production_shape(
    cmd: &ProductionCommand,
    method: WriteMethod,
    violations: &mut Vec<FieldViolation>,
) {
    require_str(&cmd.lot_number, "lot_number", violations);
    check_positive(cmd.quantity, "quantity", violations);
    check_one_of(&cmd.status, "status", &ORDER_STATUSES, violations);

    match method {
        WriteMethod::Post => {
            require_str(&cmd.part_number, "part_number", violations);
            if cmd.quantity.is_none() {
                violations.push(FieldViolation::new("quantity", "is required"));
            }
        }
        WriteMethod::Put | WriteMethod::Patch => {
            if cmd.quantity.is_none() && cmd.status.is_none() {
                violations.push(FieldViolation::new(
                    "payload",
                    "update requires quantity or status",
                ));
            }
        }
        // DELETE cancels by lot_number alone.
        WriteMethod::Delete => {}
    }
}

fn qc_shape(cmd: &QcCommand, method: WriteMethod, violations: &mut Vec<FieldViolation>) {
    require_str(&cmd.lot_number, "lot_number", violations);
    check_one_of(&cmd.result, "result", &QC_RESULTS, violations);
    check_positive(cmd.quantity_inspected, "quantity_inspected", violations);

    match method {
        WriteMethod::Post => {
            if cmd.result.is_none() {
                violations.push(FieldViolation::new("result", "is required"));
            }
            if cmd.quantity_inspected.is_none() {
                violations.push(FieldViolation::new("quantity_inspected", "is required"));
            }
        }
        WriteMethod::Put | WriteMethod::Patch => {
            if cmd.result.is_none() && cmd.notes.is_none() {
                violations.push(FieldViolation::new(
                    "payload",
                    "update requires result or notes",
                ));
            }
        }
        WriteMethod::Delete => {}
    }
}

fn inventory_shape(
    cmd: &InventoryMoveCommand,
    method: WriteMethod,
    violations: &mut Vec<FieldViolation>,
) {
    match method {
        WriteMethod::Post => {
            require_str(&cmd.part_number, "part_number", violations);
            let has_source = require_str(&cmd.source_location, "source_location", violations);
            let has_dest = require_str(&cmd.dest_location, "dest_location", violations);
            if has_source && has_dest && cmd.source_location == cmd.dest_location {
                violations.push(FieldViolation::new(
                    "dest_location",
                    "must differ from source_location",
                ));
            }
            if cmd.quantity.is_none() {
                violations.push(FieldViolation::new("quantity", "is required"));
            }
            check_positive(cmd.quantity, "quantity", violations);
        }
        // PUT/PATCH re-quantify an existing movement.
        WriteMethod::Put | WriteMethod::Patch => {
            require_str(&cmd.movement_number, "movement_number", violations);
            if cmd.quantity.is_none() {
                violations.push(FieldViolation::new("quantity", "is required"));
            }
            check_positive(cmd.quantity, "quantity", violations);
        }
        WriteMethod::Delete => {
            require_str(&cmd.movement_number, "movement_number", violations);
        }
    }
}

fn warehouse_shape(
    cmd: &StockAdjustmentCommand,
    method: WriteMethod,
    violations: &mut Vec<FieldViolation>,
) {
    match method {
        WriteMethod::Post => {
            require_str(&cmd.part_number, "part_number", violations);
            if cmd.stock_type.is_none() {
                violations.push(FieldViolation::new("stock_type", "is required"));
            }
            check_one_of(&cmd.stock_type, "stock_type", &STOCK_TYPES, violations);
            match cmd.adjustment_quantity {
                None => {
                    violations.push(FieldViolation::new("adjustment_quantity", "is required"));
                }
                Some(q) if !q.is_finite() || q == 0.0 => {
                    violations.push(FieldViolation::new(
                        "adjustment_quantity",
                        "must be a non-zero number",
                    ));
                }
                Some(_) => {}
            }
            require_str(&cmd.reason, "reason", violations);
        }
        WriteMethod::Put | WriteMethod::Patch | WriteMethod::Delete => {
            require_str(&cmd.adjustment_number, "adjustment_number", violations);
        }
    }
}

// ── Reference rules ─────────────────────────────────────────────────

async fn qc_reference(
    cmd: &QcCommand,
    reader: &dyn ReferenceReader,
    violations: &mut Vec<FieldViolation>,
) -> Result<(), ReferenceError> {
    if let Some(lot) = cmd.lot_number.as_deref().map(str::trim) {
        if !lot.is_empty() {
            if let Some(false) = reader.lot_exists(lot).await? {
                violations.push(FieldViolation::new(
                    "lot_number",
                    format!("unknown production lot '{lot}'"),
                ));
            }
        }
    }
    Ok(())
}

async fn inventory_reference(
    cmd: &InventoryMoveCommand,
    reader: &dyn ReferenceReader,
    violations: &mut Vec<FieldViolation>,
) -> Result<(), ReferenceError> {
    for (field, value) in [
        ("source_location", &cmd.source_location),
        ("dest_location", &cmd.dest_location),
    ] {
        if let Some(code) = value.as_deref().map(str::trim) {
            if !code.is_empty() {
                if let Some(false) = reader.location_exists(code).await? {
                    violations.push(FieldViolation::new(
                        field,
                        format!("unknown location '{code}'"),
                    ));
                }
            }
        }
    }

    if let (Some(part), Some(source), Some(qty)) = (
        cmd.part_number.as_deref().map(str::trim),
        cmd.source_location.as_deref().map(str::trim),
        cmd.quantity,
    ) {
        if !part.is_empty() && !source.is_empty() && qty > 0.0 {
            if let Some(available) = reader.available_stock(part, source).await? {
                if qty > available {
                    violations.push(FieldViolation::new(
                        "quantity",
                        format!(
                            "insufficient stock at {source}: requested {qty}, available {available}"
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandRequest, ResourceKind, WriteMethod};
    use crate::identity::CallerIdentity;
    use chrono::Utc;

    /// Fixture reader with a known lot, two known locations, and a
    /// fixed stock level.
    struct FixtureReader;

    #[async_trait]
    impl ReferenceReader for FixtureReader {
        async fn lot_exists(&self, lot_number: &str) -> Result<Option<bool>, ReferenceError> {
            Ok(Some(lot_number == "LOT-100"))
        }

        async fn location_exists(&self, code: &str) -> Result<Option<bool>, ReferenceError> {
            Ok(Some(code == "A1" || code == "B2"))
        }

        async fn available_stock(
            &self,
            part_number: &str,
            location_code: &str,
        ) -> Result<Option<f64>, ReferenceError> {
            if part_number == "X1" && location_code == "A1" {
                Ok(Some(10.0))
            } else {
                Ok(Some(0.0))
            }
        }
    }

    fn request(
        resource: ResourceKind,
        method: WriteMethod,
        payload: serde_json::Value,
    ) -> CommandRequest {
        CommandRequest {
            method,
            resource,
            payload,
            caller: CallerIdentity {
                id: 1,
                email: "op@topline.example".to_string(),
                roles: vec!["operator".to_string()],
            },
            received_at: Utc::now(),
        }
    }

    fn violations(err: ValidateError) -> Vec<FieldViolation> {
        match err {
            ValidateError::Invalid(e) => e.violations,
            ValidateError::Reference(e) => panic!("unexpected reference error: {e}"),
        }
    }

    #[tokio::test]
    async fn valid_inventory_move_passes() {
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "source_location": "A1",
                "dest_location": "B2",
                "quantity": 5.0
            }),
        );
        let validated = validate(req, &FixtureReader).await.unwrap();
        match validated.payload {
            CommandPayload::Inventory(cmd) => {
                assert_eq!(cmd.quantity, Some(5.0));
            }
            other => panic!("wrong payload variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn inventory_move_over_stock_is_rejected() {
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "source_location": "A1",
                "dest_location": "B2",
                "quantity": 50.0
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "quantity");
        assert!(errs[0].reason.contains("insufficient stock"));
        assert!(errs[0].reason.contains("available 10"));
    }

    #[tokio::test]
    async fn all_violations_are_reported_in_one_pass() {
        // Empty payload on POST /inventory: part, source, dest, quantity
        // all missing — every one must be reported.
        let req = request(ResourceKind::Inventory, WriteMethod::Post, serde_json::json!({}));
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        let fields: Vec<&str> = errs.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"part_number"));
        assert!(fields.contains(&"source_location"));
        assert!(fields.contains(&"dest_location"));
        assert!(fields.contains(&"quantity"));
        assert_eq!(errs.len(), 4);
    }

    #[tokio::test]
    async fn shape_and_reference_violations_combine() {
        // Missing quantity (shape) and unknown source location
        // (reference) are reported together.
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "source_location": "NOPE",
                "dest_location": "B2"
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        let fields: Vec<&str> = errs.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"quantity"));
        assert!(fields.contains(&"source_location"));
    }

    #[tokio::test]
    async fn same_source_and_dest_is_rejected() {
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "source_location": "A1",
                "dest_location": "A1",
                "quantity": 1.0
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert!(errs
            .iter()
            .any(|v| v.field == "dest_location" && v.reason.contains("differ")));
    }

    #[tokio::test]
    async fn inventory_delete_requires_only_movement_number() {
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Delete,
            serde_json::json!({"movement_number": "MV-42"}),
        );
        assert!(validate(req, &FixtureReader).await.is_ok());

        let req = request(ResourceKind::Inventory, WriteMethod::Delete, serde_json::json!({}));
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "movement_number");
    }

    #[tokio::test]
    async fn production_create_requires_lot_part_and_positive_quantity() {
        let req = request(
            ResourceKind::Production,
            WriteMethod::Post,
            serde_json::json!({"lot_number": "LOT-200", "part_number": "P-9", "quantity": 0}),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "quantity");
        assert!(errs[0].reason.contains("positive"));
    }

    #[tokio::test]
    async fn production_update_needs_quantity_or_status() {
        let req = request(
            ResourceKind::Production,
            WriteMethod::Patch,
            serde_json::json!({"lot_number": "LOT-200"}),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert!(errs.iter().any(|v| v.reason.contains("quantity or status")));

        let req = request(
            ResourceKind::Production,
            WriteMethod::Patch,
            serde_json::json!({"lot_number": "LOT-200", "status": "RELEASED"}),
        );
        assert!(validate(req, &FixtureReader).await.is_ok());
    }

    #[tokio::test]
    async fn production_rejects_unknown_status() {
        let req = request(
            ResourceKind::Production,
            WriteMethod::Patch,
            serde_json::json!({"lot_number": "LOT-200", "status": "SHIPPED"}),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs[0].field, "status");
        assert!(errs[0].reason.contains("PLANNED"));
    }

    #[tokio::test]
    async fn qc_create_rejects_unknown_lot() {
        let req = request(
            ResourceKind::QualityControl,
            WriteMethod::Post,
            serde_json::json!({
                "lot_number": "LOT-999",
                "result": "pass",
                "quantity_inspected": 3.0
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "lot_number");
        assert!(errs[0].reason.contains("LOT-999"));
    }

    #[tokio::test]
    async fn qc_create_accepts_known_lot() {
        let req = request(
            ResourceKind::QualityControl,
            WriteMethod::Post,
            serde_json::json!({
                "lot_number": "LOT-100",
                "result": "rework",
                "quantity_inspected": 3.0
            }),
        );
        assert!(validate(req, &FixtureReader).await.is_ok());
    }

    #[tokio::test]
    async fn warehouse_adjustment_rejects_zero_quantity_and_missing_reason() {
        let req = request(
            ResourceKind::Warehouse,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "stock_type": "fg",
                "adjustment_quantity": 0.0
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        let fields: Vec<&str> = errs.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"adjustment_quantity"));
        assert!(fields.contains(&"reason"));
    }

    #[tokio::test]
    async fn warehouse_rejects_unknown_stock_type() {
        let req = request(
            ResourceKind::Warehouse,
            WriteMethod::Post,
            serde_json::json!({
                "part_number": "X1",
                "stock_type": "frozen",
                "adjustment_quantity": -2.0,
                "reason": "cycle count"
            }),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "stock_type");
    }

    #[tokio::test]
    async fn null_reader_skips_reference_checks() {
        // Unknown lot passes when the reader cannot answer.
        let req = request(
            ResourceKind::QualityControl,
            WriteMethod::Post,
            serde_json::json!({
                "lot_number": "LOT-999",
                "result": "pass",
                "quantity_inspected": 1.0
            }),
        );
        assert!(validate(req, &NullReferenceReader).await.is_ok());
    }

    #[tokio::test]
    async fn type_mismatch_reports_payload_violation() {
        let req = request(
            ResourceKind::Inventory,
            WriteMethod::Post,
            serde_json::json!({"quantity": "five"}),
        );
        let errs = violations(validate(req, &FixtureReader).await.unwrap_err());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "payload");
    }

    #[test]
    fn validation_error_display_joins_violations() {
        let err = ValidationError {
            violations: vec![
                FieldViolation::new("quantity", "is required"),
                FieldViolation::new("reason", "must not be empty"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("quantity: is required"));
        assert!(text.contains("reason: must not be empty"));
    }
}
