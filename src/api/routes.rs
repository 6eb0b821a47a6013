use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::AppState;

use super::changes::publish_change;
use super::health::health;
use super::metrics::prometheus_metrics;

/// Largest change body accepted on POST /api/changes
pub const MAX_CHANGE_BODY_BYTES: usize = 64 * 1024;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api",
            Router::new()
                .route("/changes", post(publish_change))
                .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_CHANGE_BODY_BYTES))),
        )
}
