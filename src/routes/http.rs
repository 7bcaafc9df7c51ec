// GET handlers: version, api/health, api/charts

use axum::{extract::State, response::IntoResponse};

use super::AppState;
use crate::history::wire;

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health — last-known probe results, without chart history.
pub(super) async fn api_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.health.read().await.clone())
}

/// GET /api/charts — compact columnar history for every resolution.
pub(super) async fn api_charts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    axum::Json(wire::build_payload(&store))
}
