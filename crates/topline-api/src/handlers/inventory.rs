//! Inventory stock movements.
//!
//! POST moves stock between locations; PUT/PATCH re-quantify an
//! existing movement (reverse, then re-apply at the new quantity);
//! DELETE voids a movement. Every balance change locks the affected
//! rows and refuses to drive any balance negative — a race the
//! validator could not see surfaces here as a 409.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use topline_core::validate::{CommandPayload, InventoryMoveCommand};
use topline_core::{ValidatedCommand, WriteMethod};
use uuid::Uuid;

use super::required;
use crate::dispatch::{CommandHandler, HandlerError};

pub struct InventoryHandler;

#[async_trait]
impl CommandHandler for InventoryHandler {
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cmd: &ValidatedCommand,
    ) -> Result<Uuid, HandlerError> {
        let CommandPayload::Inventory(p) = &cmd.payload else {
            return Err(HandlerError::Internal(
                "payload does not match inventory resource".to_string(),
            ));
        };

        match cmd.request.method {
            WriteMethod::Post => execute_movement(tx, p, cmd.request.caller.id).await,
            WriteMethod::Put | WriteMethod::Patch => requantify_movement(tx, p).await,
            WriteMethod::Delete => void_movement(tx, p).await,
        }
    }
}

async fn execute_movement(
    tx: &mut Transaction<'_, Postgres>,
    p: &InventoryMoveCommand,
    caller_id: i64,
) -> Result<Uuid, HandlerError> {
    let part = required(&p.part_number, "part_number")?;
    let source = required(&p.source_location, "source_location")?;
    let dest = required(&p.dest_location, "dest_location")?;
    let quantity = *required(&p.quantity, "quantity")?;

    transfer(tx, part, source, dest, quantity).await?;

    let id = Uuid::new_v4();
    let movement_number = format!("MV-{}", id.simple());
    sqlx::query(
        "INSERT INTO inventory_movements
         (id, movement_number, part_number, source_location, dest_location, quantity, moved_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(&movement_number)
    .bind(part)
    .bind(source)
    .bind(dest)
    .bind(quantity)
    .bind(caller_id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

async fn requantify_movement(
    tx: &mut Transaction<'_, Postgres>,
    p: &InventoryMoveCommand,
) -> Result<Uuid, HandlerError> {
    let movement_number = required(&p.movement_number, "movement_number")?;
    let new_quantity = *required(&p.quantity, "quantity")?;

    let movement = lock_movement(tx, movement_number).await?;

    // Reverse the original transfer, then re-apply at the new quantity.
    // Both legs check balances, so stock already consumed downstream
    // rejects the amendment instead of going negative.
    transfer(
        tx,
        &movement.part_number,
        &movement.dest_location,
        &movement.source_location,
        movement.quantity,
    )
    .await?;
    transfer(
        tx,
        &movement.part_number,
        &movement.source_location,
        &movement.dest_location,
        new_quantity,
    )
    .await?;

    sqlx::query(
        "UPDATE inventory_movements SET quantity = $2, updated_at = now() WHERE id = $1",
    )
    .bind(movement.id)
    .bind(new_quantity)
    .execute(&mut **tx)
    .await?;

    Ok(movement.id)
}

async fn void_movement(
    tx: &mut Transaction<'_, Postgres>,
    p: &InventoryMoveCommand,
) -> Result<Uuid, HandlerError> {
    let movement_number = required(&p.movement_number, "movement_number")?;
    let movement = lock_movement(tx, movement_number).await?;

    transfer(
        tx,
        &movement.part_number,
        &movement.dest_location,
        &movement.source_location,
        movement.quantity,
    )
    .await?;

    sqlx::query(
        "UPDATE inventory_movements SET voided_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(movement.id)
    .execute(&mut **tx)
    .await?;

    Ok(movement.id)
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    part_number: String,
    source_location: String,
    dest_location: String,
    quantity: f64,
    voided_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lock a movement row; voided movements cannot be touched again.
async fn lock_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement_number: &str,
) -> Result<MovementRow, HandlerError> {
    let row: Option<MovementRow> = sqlx::query_as(
        "SELECT id, part_number, source_location, dest_location, quantity, voided_at
         FROM inventory_movements
         WHERE movement_number = $1
         FOR UPDATE",
    )
    .bind(movement_number)
    .fetch_optional(&mut **tx)
    .await?;

    let movement = row.ok_or_else(|| {
        HandlerError::Conflict(format!("unknown movement '{movement_number}'"))
    })?;
    if movement.voided_at.is_some() {
        return Err(HandlerError::Conflict(format!(
            "movement '{movement_number}' is already voided"
        )));
    }
    Ok(movement)
}

/// Move `quantity` of `part` from one location's balance to another's.
///
/// Locks the source balance, refuses to overdraw it, and upserts the
/// destination balance.
async fn transfer(
    tx: &mut Transaction<'_, Postgres>,
    part: &str,
    from: &str,
    to: &str,
    quantity: f64,
) -> Result<(), HandlerError> {
    let available: Option<f64> = sqlx::query_scalar(
        "SELECT available_quantity FROM inventory_balances
         WHERE part_number = $1 AND location_code = $2
         FOR UPDATE",
    )
    .bind(part)
    .bind(from)
    .fetch_optional(&mut **tx)
    .await?;

    let available = available.unwrap_or(0.0);
    if quantity > available {
        return Err(HandlerError::Conflict(format!(
            "insufficient stock of '{part}' at {from}: requested {quantity}, available {available}"
        )));
    }

    sqlx::query(
        "UPDATE inventory_balances
         SET available_quantity = available_quantity - $3, updated_at = now()
         WHERE part_number = $1 AND location_code = $2",
    )
    .bind(part)
    .bind(from)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO inventory_balances (id, part_number, location_code, available_quantity)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (part_number, location_code) DO UPDATE SET
            available_quantity = inventory_balances.available_quantity + EXCLUDED.available_quantity,
            updated_at = now()",
    )
    .bind(Uuid::new_v4())
    .bind(part)
    .bind(to)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
