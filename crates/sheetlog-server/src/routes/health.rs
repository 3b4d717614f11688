//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub datasets: usize,
    pub release_notes: bool,
    pub version: String,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let datasets = state.engine.datasets().await?.len();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        datasets,
        release_notes: state.config.summarizer.is_some(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
