//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub websocket: WebSocketHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct WebSocketHealthResponse {
    pub route: String,
    /// Connections still registered with the model
    pub registered_listeners: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        websocket: WebSocketHealthResponse {
            route: state.handler.route().to_string(),
            registered_listeners: state.model.listener_count(),
        },
    })
}
