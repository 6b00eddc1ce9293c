//! # Health & Info Probes
//!
//! The only read endpoints this service answers. Mounted outside the
//! CQRS guard and the auth middleware so monitors and load balancers
//! reach them without credentials.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

const SERVICE_NAME: &str = "Topline Command Service";

/// Build the probes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
}

/// Health probe response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// `connected` or `disconnected`.
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

/// Static service metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
    pub service: String,
    pub version: String,
    pub description: String,
}

/// GET /health — liveness plus a database reachability check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "probes"
)]
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.db_pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "connected",
            Err(err) => {
                tracing::warn!(error = %err, "health probe could not reach database");
                "disconnected"
            }
        },
        None => "disconnected",
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        database: database.to_string(),
        timestamp: Utc::now(),
    })
}

/// GET /info — static service metadata.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Service metadata", body = InfoResponse)),
    tag = "probes"
)]
pub(crate) async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Write operations for the Topline manufacturing ERP".to_string(),
    })
}
