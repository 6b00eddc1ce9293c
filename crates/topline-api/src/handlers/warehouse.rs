//! Warehouse stock adjustments.
//!
//! POST applies a signed adjustment to a part's stock bucket (fg, wip,
//! raw) and records it with the resulting level; DELETE voids an
//! adjustment and reverses its effect. Adjustments themselves are
//! immutable — amending one means voiding it and submitting a new one.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use topline_core::validate::{CommandPayload, StockAdjustmentCommand};
use topline_core::{ValidatedCommand, WriteMethod};
use uuid::Uuid;

use super::required;
use crate::dispatch::{CommandHandler, HandlerError};

pub struct WarehouseHandler;

#[async_trait]
impl CommandHandler for WarehouseHandler {
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cmd: &ValidatedCommand,
    ) -> Result<Uuid, HandlerError> {
        let CommandPayload::Warehouse(p) = &cmd.payload else {
            return Err(HandlerError::Internal(
                "payload does not match warehouse resource".to_string(),
            ));
        };

        match cmd.request.method {
            WriteMethod::Post => apply_adjustment(tx, p, cmd.request.caller.id).await,
            WriteMethod::Put | WriteMethod::Patch => Err(HandlerError::Conflict(
                "stock adjustments are immutable — void with DELETE and submit a new adjustment"
                    .to_string(),
            )),
            WriteMethod::Delete => void_adjustment(tx, p).await,
        }
    }
}

async fn apply_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    p: &StockAdjustmentCommand,
    caller_id: i64,
) -> Result<Uuid, HandlerError> {
    let part = required(&p.part_number, "part_number")?;
    let stock_type = required(&p.stock_type, "stock_type")?;
    let adjustment = *required(&p.adjustment_quantity, "adjustment_quantity")?;
    let reason = required(&p.reason, "reason")?;

    let new_quantity = shift_stock_level(tx, part, stock_type, adjustment).await?;

    let id = Uuid::new_v4();
    let adjustment_number = format!("ADJ-{}", id.simple());
    sqlx::query(
        "INSERT INTO stock_adjustments
         (id, adjustment_number, part_number, stock_type, adjustment_quantity,
          new_quantity, reason, adjusted_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id)
    .bind(&adjustment_number)
    .bind(part)
    .bind(stock_type)
    .bind(adjustment)
    .bind(new_quantity)
    .bind(reason)
    .bind(caller_id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn void_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    p: &StockAdjustmentCommand,
) -> Result<Uuid, HandlerError> {
    let adjustment_number = required(&p.adjustment_number, "adjustment_number")?;

    let row: Option<(Uuid, String, String, f64, Option<chrono::DateTime<chrono::Utc>>)> =
        sqlx::query_as(
            "SELECT id, part_number, stock_type, adjustment_quantity, voided_at
             FROM stock_adjustments
             WHERE adjustment_number = $1
             FOR UPDATE",
        )
        .bind(adjustment_number)
        .fetch_optional(&mut **tx)
        .await?;

    let (id, part, stock_type, adjustment, voided_at) = row.ok_or_else(|| {
        HandlerError::Conflict(format!("unknown adjustment '{adjustment_number}'"))
    })?;
    if voided_at.is_some() {
        return Err(HandlerError::Conflict(format!(
            "adjustment '{adjustment_number}' is already voided"
        )));
    }

    shift_stock_level(tx, &part, &stock_type, -adjustment).await?;

    sqlx::query("UPDATE stock_adjustments SET voided_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(id)
}

/// Apply a signed delta to a part's stock bucket under a row lock,
/// refusing to drive it negative. Returns the resulting level.
async fn shift_stock_level(
    tx: &mut Transaction<'_, Postgres>,
    part: &str,
    stock_type: &str,
    delta: f64,
) -> Result<f64, HandlerError> {
    let current: Option<f64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_levels
         WHERE part_number = $1 AND stock_type = $2
         FOR UPDATE",
    )
    .bind(part)
    .bind(stock_type)
    .fetch_optional(&mut **tx)
    .await?;

    let current = current.unwrap_or(0.0);
    let new_quantity = current + delta;
    if new_quantity < 0.0 {
        return Err(HandlerError::Conflict(format!(
            "adjustment would drive {stock_type} stock of '{part}' negative (current {current})"
        )));
    }

    sqlx::query(
        "INSERT INTO stock_levels (id, part_number, stock_type, quantity)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (part_number, stock_type) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            updated_at = now()",
    )
    .bind(Uuid::new_v4())
    .bind(part)
    .bind(stock_type)
    .bind(new_quantity)
    .execute(&mut **tx)
    .await?;

    Ok(new_quantity)
}
