// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::history::HistoryStore;
use crate::models::{HealthSnapshot, PushMessage};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<RwLock<HistoryStore>>,
    pub(crate) health: Arc<RwLock<HealthSnapshot>>,
    pub(crate) push_tx: broadcast::Sender<PushMessage>,
}

pub fn app(
    store: Arc<RwLock<HistoryStore>>,
    health: Arc<RwLock<HealthSnapshot>>,
    push_tx: broadcast::Sender<PushMessage>,
    config: &AppConfig,
) -> Router {
    let state = AppState {
        store,
        health,
        push_tx,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/health", get(http::api_health_handler)) // GET /api/health
        .route("/api/charts", get(http::api_charts_handler)) // GET /api/charts
        .route("/ws", get(ws::ws_push)) // WS /ws
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
