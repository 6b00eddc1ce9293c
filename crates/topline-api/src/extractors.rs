//! # Extraction Helpers
//!
//! JSON body extraction with deserialization errors mapped to
//! [`AppError::BadRequest`], plus request-metadata helpers for the
//! audit trail.

use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::http::HeaderMap;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to
/// [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Best-effort client IP from proxy headers.
///
/// `X-Forwarded-For` may carry a comma-separated chain; the first hop
/// is the originating client.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

/// The caller's user agent, if sent.
pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.1.2.3, 172.16.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.9.9.9"));
    }

    #[test]
    fn client_ip_absent_when_no_headers() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
