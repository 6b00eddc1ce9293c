//! Production job orders.
//!
//! POST creates an order in `PLANNED` state; PUT/PATCH adjust quantity
//! or move status; DELETE cancels. Orders in a terminal state
//! (`COMPLETED`, `CANCELLED`) cannot be changed.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use topline_core::validate::{CommandPayload, ProductionCommand};
use topline_core::{ValidatedCommand, WriteMethod};
use uuid::Uuid;

use super::required;
use crate::dispatch::{CommandHandler, HandlerError};

const TERMINAL_STATUSES: [&str; 2] = ["COMPLETED", "CANCELLED"];

pub struct ProductionHandler;

#[async_trait]
impl CommandHandler for ProductionHandler {
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cmd: &ValidatedCommand,
    ) -> Result<Uuid, HandlerError> {
        let CommandPayload::Production(p) = &cmd.payload else {
            return Err(HandlerError::Internal(
                "payload does not match production resource".to_string(),
            ));
        };
        let lot = required(&p.lot_number, "lot_number")?;

        match cmd.request.method {
            WriteMethod::Post => create_order(tx, p, lot, cmd.request.caller.id).await,
            WriteMethod::Put | WriteMethod::Patch => update_order(tx, p, lot).await,
            WriteMethod::Delete => cancel_order(tx, lot).await,
        }
    }
}

async fn create_order(
    tx: &mut Transaction<'_, Postgres>,
    p: &ProductionCommand,
    lot: &str,
    caller_id: i64,
) -> Result<Uuid, HandlerError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM production_orders WHERE lot_number = $1)")
            .bind(lot)
            .fetch_one(&mut **tx)
            .await?;
    if exists {
        return Err(HandlerError::Conflict(format!("duplicate lot '{lot}'")));
    }

    let part = required(&p.part_number, "part_number")?;
    let quantity = *required(&p.quantity, "quantity")?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO production_orders (id, lot_number, part_number, quantity, status, created_by)
         VALUES ($1, $2, $3, $4, 'PLANNED', $5)",
    )
    .bind(id)
    .bind(lot)
    .bind(part)
    .bind(quantity)
    .bind(caller_id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn update_order(
    tx: &mut Transaction<'_, Postgres>,
    p: &ProductionCommand,
    lot: &str,
) -> Result<Uuid, HandlerError> {
    let (id, status) = lock_order(tx, lot).await?;
    if TERMINAL_STATUSES.contains(&status.as_str()) {
        return Err(HandlerError::Conflict(format!(
            "lot '{lot}' is already {status}"
        )));
    }

    sqlx::query(
        "UPDATE production_orders
         SET quantity = COALESCE($2, quantity),
             status = COALESCE($3, status),
             updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(p.quantity)
    .bind(&p.status)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn cancel_order(
    tx: &mut Transaction<'_, Postgres>,
    lot: &str,
) -> Result<Uuid, HandlerError> {
    let (id, status) = lock_order(tx, lot).await?;
    if TERMINAL_STATUSES.contains(&status.as_str()) {
        return Err(HandlerError::Conflict(format!(
            "lot '{lot}' is already {status}"
        )));
    }

    sqlx::query(
        "UPDATE production_orders SET status = 'CANCELLED', updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// Lock the order row for the rest of the transaction.
async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    lot: &str,
) -> Result<(Uuid, String), HandlerError> {
    let row: Option<(Uuid, String)> =
        sqlx::query_as("SELECT id, status FROM production_orders WHERE lot_number = $1 FOR UPDATE")
            .bind(lot)
            .fetch_optional(&mut **tx)
            .await?;

    row.ok_or_else(|| HandlerError::Conflict(format!("unknown lot '{lot}'")))
}
