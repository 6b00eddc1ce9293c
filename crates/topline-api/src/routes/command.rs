//! # Command Endpoints
//!
//! The single write surface of the service. One dynamic route serves
//! all four resource families; the handler sequences the pipeline per
//! request:
//!
//! ```text
//! resource parse → validate (all violations at once) → dispatch
//! (transaction) → audit (fire-and-forget) → response
//! ```
//!
//! Requests that fail validation are audited as `rejected`; dispatched
//! commands are audited from inside the dispatcher after their terminal
//! result is determined.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use topline_core::validate::{validate, NullReferenceReader, ValidateError};
use topline_core::{
    CommandRequest, CommandResult, CommandStatus, FailureKind, ResourceKind, UnknownResource,
    WriteMethod,
};

use crate::audit::{AuditContext, AuditEntry};
use crate::auth::Caller;
use crate::db::reference::PgReferenceReader;
use crate::dispatch::dispatch;
use crate::error::AppError;
use crate::extractors::{client_ip, extract_json, user_agent};
use crate::state::AppState;

/// Build the command router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/command/:resource",
        post(submit_command)
            .put(submit_command)
            .patch(submit_command)
            .delete(submit_command),
    )
}

/// POST|PUT|PATCH|DELETE /api/command/{resource} — submit a command.
///
/// The body is resource-specific JSON. An optional `Idempotency-Key`
/// header makes a committed command safe to retry: replaying the key
/// returns the recorded result without re-applying effects.
#[utoipa::path(
    post,
    path = "/api/command/{resource}",
    params(
        ("resource" = String, Path,
         description = "Resource family: production, quality-control, inventory, warehouse"),
    ),
    responses(
        (status = 201, description = "Command committed", body = CommandResult),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorBody),
        (status = 409, description = "Conflict with current state", body = CommandResult),
        (status = 422, description = "Validation failed; every violated field listed", body = CommandResult),
        (status = 500, description = "Transaction failed and was rolled back", body = CommandResult),
        (status = 503, description = "Backing store unavailable", body = CommandResult),
    ),
    tag = "command",
    security(("bearer_auth" = []))
)]
pub(crate) async fn submit_command(
    State(state): State<AppState>,
    method: Method,
    Path(resource): Path<String>,
    headers: HeaderMap,
    Caller(caller): Caller,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CommandResult>), AppError> {
    let resource: ResourceKind = resource
        .parse()
        .map_err(|e: UnknownResource| AppError::NotFound(e.to_string()))?;

    // The CQRS guard rejects read methods before this handler runs.
    let Some(method) = WriteMethod::from_method_str(method.as_str()) else {
        return Err(AppError::BadRequest(
            "read method on command endpoint".to_string(),
        ));
    };

    let payload = extract_json(body)?;
    let request = CommandRequest {
        method,
        resource,
        payload,
        caller,
        received_at: Utc::now(),
    };

    let audit_ctx = AuditContext {
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Validation needs the request back for audit attribution on the
    // rejection path.
    let audit_request = request.clone();
    let outcome = match &state.db_pool {
        Some(pool) => {
            let reader = PgReferenceReader::new(pool.clone());
            validate(request, &reader).await
        }
        None => validate(request, &NullReferenceReader).await,
    };

    let validated = match outcome {
        Ok(validated) => validated,
        Err(ValidateError::Invalid(err)) => {
            let result = CommandResult::invalid(&err);
            state.audit.record(AuditEntry::for_request(
                &audit_request,
                result.audit_status(),
                &audit_ctx,
            ));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(result)));
        }
        Err(err @ ValidateError::Reference(_)) => return Err(err.into()),
    };

    let result = dispatch(&state, validated, idempotency_key, audit_ctx).await;
    let status = response_status(method, &result);
    Ok((status, Json(result)))
}

/// Translate a terminal pipeline state into its HTTP status.
fn response_status(method: WriteMethod, result: &CommandResult) -> StatusCode {
    match (result.status, result.error.as_ref().map(|e| e.kind)) {
        (CommandStatus::Success, _) if method == WriteMethod::Post => StatusCode::CREATED,
        (CommandStatus::Success, _) => StatusCode::OK,
        (_, Some(FailureKind::Conflict)) => StatusCode::CONFLICT,
        (_, Some(FailureKind::Validation)) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, Some(FailureKind::Unavailable)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn committed_post_maps_to_created() {
        let result = CommandResult::success(Uuid::new_v4());
        assert_eq!(
            response_status(WriteMethod::Post, &result),
            StatusCode::CREATED
        );
        assert_eq!(response_status(WriteMethod::Put, &result), StatusCode::OK);
        assert_eq!(
            response_status(WriteMethod::Delete, &result),
            StatusCode::OK
        );
    }

    #[test]
    fn failure_kinds_map_to_spec_status_codes() {
        let conflict = CommandResult::failed(FailureKind::Conflict, "insufficient stock");
        assert_eq!(
            response_status(WriteMethod::Post, &conflict),
            StatusCode::CONFLICT
        );

        let txn = CommandResult::failed(FailureKind::Transaction, "rolled back");
        assert_eq!(
            response_status(WriteMethod::Post, &txn),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let unavailable = CommandResult::failed(FailureKind::Unavailable, "no database");
        assert_eq!(
            response_status(WriteMethod::Post, &unavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
