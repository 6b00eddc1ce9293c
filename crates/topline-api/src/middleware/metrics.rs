//! # Request Metrics
//!
//! Lightweight in-process counters over the command surface. Kept as
//! atomics rather than a full metrics registry — the query service owns
//! the operator dashboards; these counters exist for logs and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

/// Shared counter state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    requests: Arc<AtomicU64>,
    write_requests: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests observed.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Requests that carried a write method.
    pub fn write_requests(&self) -> u64 {
        self.write_requests.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Middleware that counts requests, writes, and error responses.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let is_write = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.requests.fetch_add(1, Ordering::Relaxed);
        if is_write {
            m.write_requests.fetch_add(1, Ordering::Relaxed);
        }
        if response.status().is_client_error() || response.status().is_server_error() {
            m.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}
