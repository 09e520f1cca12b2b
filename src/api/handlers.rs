use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;
use crate::stats::StatsSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.stats.reset();
    tracing::info!("Statistics reset");
    Json(ResetResponse {
        status: "ok".to_string(),
    })
}
