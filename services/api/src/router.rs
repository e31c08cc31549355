//! Axum Router Configuration
//!
//! This module defines the HTTP routing for the service: a health route and
//! the WebSocket endpoint.

use crate::{state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Plain-text liveness check.
pub async fn index() -> &'static str {
    "Server is running."
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
        .layer(cors)
}
