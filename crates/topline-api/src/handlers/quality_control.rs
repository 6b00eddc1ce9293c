//! Quality-control inspections.
//!
//! POST records an inspection against an existing production lot;
//! PUT/PATCH amend the lot's latest inspection; DELETE voids it.
//! Inspections are never hard-deleted — voiding keeps the trail.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use topline_core::validate::{CommandPayload, QcCommand};
use topline_core::{ValidatedCommand, WriteMethod};
use uuid::Uuid;

use super::required;
use crate::dispatch::{CommandHandler, HandlerError};

pub struct QcHandler;

#[async_trait]
impl CommandHandler for QcHandler {
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cmd: &ValidatedCommand,
    ) -> Result<Uuid, HandlerError> {
        let CommandPayload::QualityControl(p) = &cmd.payload else {
            return Err(HandlerError::Internal(
                "payload does not match quality-control resource".to_string(),
            ));
        };
        let lot = required(&p.lot_number, "lot_number")?;

        match cmd.request.method {
            WriteMethod::Post => record_inspection(tx, p, lot, cmd.request.caller.id).await,
            WriteMethod::Put | WriteMethod::Patch => amend_inspection(tx, p, lot).await,
            WriteMethod::Delete => void_inspection(tx, lot).await,
        }
    }
}

async fn record_inspection(
    tx: &mut Transaction<'_, Postgres>,
    p: &QcCommand,
    lot: &str,
    caller_id: i64,
) -> Result<Uuid, HandlerError> {
    // The validator checked lot existence outside the transaction;
    // re-check here so a concurrent lot deletion surfaces as a 409.
    let lot_found: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM production_orders WHERE lot_number = $1)")
            .bind(lot)
            .fetch_one(&mut **tx)
            .await?;
    if !lot_found {
        return Err(HandlerError::Conflict(format!(
            "unknown production lot '{lot}'"
        )));
    }

    let result = required(&p.result, "result")?;
    let quantity = *required(&p.quantity_inspected, "quantity_inspected")?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO qc_inspections (id, lot_number, result, quantity_inspected, notes, inspected_by)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(lot)
    .bind(result)
    .bind(quantity)
    .bind(&p.notes)
    .bind(caller_id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn amend_inspection(
    tx: &mut Transaction<'_, Postgres>,
    p: &QcCommand,
    lot: &str,
) -> Result<Uuid, HandlerError> {
    let id = lock_latest_inspection(tx, lot).await?;

    sqlx::query(
        "UPDATE qc_inspections
         SET result = COALESCE($2, result),
             notes = COALESCE($3, notes),
             updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(&p.result)
    .bind(&p.notes)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn void_inspection(
    tx: &mut Transaction<'_, Postgres>,
    lot: &str,
) -> Result<Uuid, HandlerError> {
    let id = lock_latest_inspection(tx, lot).await?;

    sqlx::query("UPDATE qc_inspections SET voided_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(id)
}

/// Lock the lot's most recent non-voided inspection.
async fn lock_latest_inspection(
    tx: &mut Transaction<'_, Postgres>,
    lot: &str,
) -> Result<Uuid, HandlerError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM qc_inspections
         WHERE lot_number = $1 AND voided_at IS NULL
         ORDER BY created_at DESC
         LIMIT 1
         FOR UPDATE",
    )
    .bind(lot)
    .fetch_optional(&mut **tx)
    .await?;

    id.ok_or_else(|| {
        HandlerError::Conflict(format!("no open inspection recorded for lot '{lot}'"))
    })
}
