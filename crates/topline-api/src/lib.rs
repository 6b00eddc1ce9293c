//! # topline-api — Command Service for the Topline Manufacturing ERP
//!
//! The write side of a CQRS split, built on Axum/Tower/Tokio. Reads are
//! served by the separate query service; this service accepts only
//! state-mutating commands and runs each one through a rigorous intake
//! pipeline: authentication, validation, transactional dispatch, and
//! append-only audit logging.
//!
//! ## API Surface
//!
//! | Route                           | Module               | Notes                      |
//! |---------------------------------|----------------------|----------------------------|
//! | `POST\|PUT\|PATCH\|DELETE /api/command/{resource}` | [`routes::command`] | production, quality-control, inventory, warehouse |
//! | `GET /health`                   | [`routes::health`]   | unauthenticated            |
//! | `GET /info`                     | [`routes::health`]   | unauthenticated            |
//! | `GET /openapi.json`             | [`openapi`]          | unauthenticated            |
//! | any other read                  | [`middleware::cqrs`] | 405 → query service        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! CorsLayer → DefaultBodyLimit → TraceLayer → Metrics → CqrsGuard → Auth → RateLimit → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - Domain rules live in `topline-core`; this crate orchestrates.
//! - All shared state is constructed once at startup into [`AppState`]
//!   and injected — no module-level singletons.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod audit;
pub mod auth;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthContext;
use crate::middleware::cqrs::QueryServicePointer;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Probes (`/health`, `/info`, `/openapi.json`) are mounted outside the
/// CQRS guard and the auth middleware so they remain accessible without
/// credentials.
pub fn app(state: AppState) -> Router {
    let auth_context = AuthContext::from_secret(state.config.jwt_secret.as_ref());
    if auth_context.verifier.is_none() {
        tracing::warn!("JWT_SECRET not set — authentication disabled (development mode)");
    }
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: state.config.rate_limit_max_requests,
        window_secs: state.config.rate_limit_window_secs,
    });
    let query_pointer = QueryServicePointer(state.config.query_service_url.clone());

    // Command routes.
    //
    // Middleware execution order (outermost → innermost):
    //   CorsLayer → DefaultBodyLimit → TraceLayer → Metrics → CqrsGuard → Auth → RateLimit → Handler
    //
    // The CQRS guard runs before auth so read traffic is redirected to
    // the query service without consuming credential verification work;
    // rate limiting runs after auth so the limit key is the verified
    // caller identity.
    let api = Router::new()
        .merge(routes::command::router())
        // Unmatched paths still pass the CQRS guard, so stray reads get
        // the query-service pointer rather than a bare 404.
        .fallback(not_found)
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::cqrs::cqrs_guard))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(Extension(auth_context))
        .layer(Extension(metrics))
        .layer(Extension(limiter))
        .layer(Extension(query_pointer))
        .with_state(state.clone());

    // Unauthenticated probes.
    let probes = Router::new()
        .merge(routes::health::router())
        .merge(openapi::router())
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

async fn not_found() -> AppError {
    AppError::NotFound("no such endpoint".to_string())
}
