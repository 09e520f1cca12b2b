use axum::{routing::get, Router};

use crate::server::AppState;

use super::dashboard::dashboard;
use super::handlers::{health, reset, stats};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/reset", get(reset).post(reset))
}
