//! HTTP trigger for model changes

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct PublishChangeResponse {
    /// Listeners the change was handed to
    pub notified: usize,
    pub timestamp: DateTime<Utc>,
}

/// Publish a change into the model; every registered connection receives it
#[tracing::instrument(name = "http.publish_change", skip(state, payload))]
pub async fn publish_change(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PublishChangeResponse>> {
    let Json(change) = payload?;
    if change.is_null() {
        return Err(AppError::Validation("change must not be null".to_string()));
    }

    let notified = state.model.publish(&change);
    tracing::info!(notified = notified, "Model change published");

    Ok(Json(PublishChangeResponse {
        notified,
        timestamp: Utc::now(),
    }))
}
