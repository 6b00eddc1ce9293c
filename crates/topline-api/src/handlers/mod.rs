//! # Domain Handlers
//!
//! One handler per resource kind, registered with the dispatcher at
//! startup. Each handler executes fully inside the per-request
//! transaction its caller opened; state checks take row locks
//! (`FOR UPDATE`) so concurrent commands serialize on the rows they
//! touch rather than losing updates.
//!
//! Handlers receive commands that already passed validation for their
//! method; conflicts with current state (insufficient stock, duplicate
//! lot, terminal records) are theirs to detect and raise.

pub mod inventory;
pub mod production;
pub mod quality_control;
pub mod warehouse;

use crate::dispatch::HandlerError;

/// Access a field the validator guarantees for this method.
///
/// A miss here means the validation rules and the handler disagree —
/// an internal error, not the caller's.
pub(crate) fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, HandlerError> {
    value
        .as_ref()
        .ok_or_else(|| HandlerError::Internal(format!("validated command missing {field}")))
}
