//! # OpenAPI Specification Assembly
//!
//! Assembles the documented routes into a single OpenAPI spec served at
//! `/openapi.json`, mounted with the probes so integrators can fetch it
//! without credentials.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "HS256 bearer token. Signing key set via JWT_SECRET env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the command surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Topline Command Service",
        version = "2.0.0",
        description = "Write operations for the Topline manufacturing ERP.\n\nThis is the command side of a CQRS split: only POST/PUT/PATCH/DELETE reach the pipeline, and every other read is redirected to the separate query service. Commands are authenticated with HS256 bearer tokens, validated with all field violations reported at once, executed inside one transaction per request, and audited append-only.",
    ),
    servers(
        (url = "http://localhost:3108", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::command::submit_command,
        crate::routes::health::health,
        crate::routes::health::info,
    ),
    components(schemas(
        topline_core::command::CommandResult,
        topline_core::command::CommandStatus,
        topline_core::command::FailureInfo,
        topline_core::command::FailureKind,
        topline_core::command::ResourceKind,
        topline_core::command::WriteMethod,
        topline_core::validate::FieldViolation,
        topline_core::validate::ProductionCommand,
        topline_core::validate::QcCommand,
        topline_core::validate::InventoryMoveCommand,
        topline_core::validate::StockAdjustmentCommand,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::health::HealthResponse,
        crate::routes::health::InfoResponse,
    )),
    tags(
        (name = "command", description = "Write operations, one dynamic route per resource family"),
        (name = "probes", description = "Unauthenticated health and metadata probes"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_spec))
}

async fn serve_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_includes_command_and_probe_paths() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.contains("/api/command/")));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths.iter().any(|p| p.as_str() == "/info"));
    }
}
