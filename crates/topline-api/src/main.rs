//! # topline-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Topline command service.
//! Binds to a configurable port (default 3108).

use topline_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    // Initialize database pool (optional — absent means degraded mode).
    let db_pool = topline_api::db::init_pool(&config).await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let state = AppState::with_config(config, db_pool);

    // A missing handler registration is a configuration error, caught
    // at startup rather than as a runtime failure deep in dispatch.
    state.registry.verify_complete()?;

    let app = topline_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Topline command service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
