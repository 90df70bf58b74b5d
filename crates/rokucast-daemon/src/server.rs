//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .route("/api/devices", get(api::list_devices))
        .route("/api/scan", post(api::trigger_scan).delete(api::cancel_scan))
        .route("/api/status", get(api::get_status))
        .route("/api/settings", get(api::get_settings))
        .route("/api/select", post(api::select_device))
        .route("/api/device", post(api::set_device))
        .route("/api/cast", post(api::cast))
        .route("/api/config", get(api::get_config))
        .route("/api/addresses", get(api::get_addresses))
        // WebSocket for real-time updates
        .route("/ws", get(ws::websocket_handler))
        // Static options page
        .fallback_service(ServeDir::new("web"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server and the start-up scan
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state.clone());

    // Start-up scan in background
    tokio::spawn(async move {
        if let Err(e) = state.setup().await {
            error!(error = %e, "Start-up scan failed");
        }
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}
