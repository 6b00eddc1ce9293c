//! # CQRS Boundary Enforcement
//!
//! This service is the write side of a CQRS split: reads are served by
//! a separate query service. The guard rejects every read method
//! reaching the command surface with `405` and a machine-readable
//! pointer to the query service. Pure routing policy — no business
//! logic, and it runs before authentication so read traffic never
//! consumes credential verification work.
//!
//! Health and info probes are mounted outside this guard.

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{ErrorBody, ErrorDetail};

/// Where read traffic should go instead. Injected into request
/// extensions at router assembly.
#[derive(Debug, Clone)]
pub struct QueryServicePointer(pub String);

/// Reject non-write methods with a redirection to the query service.
pub async fn cqrs_guard(request: Request, next: Next) -> Response {
    let is_write = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if is_write {
        return next.run(request).await;
    }

    let pointer = request
        .extensions()
        .get::<QueryServicePointer>()
        .map(|p| p.0.clone());

    let message = match pointer {
        Some(url) => format!("read operations are served by the query service at {url}"),
        None => "read operations are served by the separate query service".to_string(),
    };

    let body = ErrorBody {
        error: ErrorDetail {
            code: "USE_QUERY_SERVICE".to_string(),
            message,
            details: None,
        },
    };

    let mut response = (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response();
    response.headers_mut().insert(
        header::ALLOW,
        HeaderValue::from_static("POST, PUT, PATCH, DELETE"),
    );
    response
}
