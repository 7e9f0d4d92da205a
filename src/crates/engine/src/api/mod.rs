//! HTTP/WebSocket surface: a liveness endpoint and the execution session
//! endpoint that the rest of the crate is built to serve.

pub mod ws;

use crate::config::EngineConfig;
use crate::search::SearchClient;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Collaborators shared across every session on this process (§3
/// "Lifecycles": sessions share process-wide configuration and client
/// factories, never runtime state).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub chat_model: Arc<llm::OpenRouterClient>,
    pub search_client: Arc<dyn SearchClient>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/ws/execute", get(ws::upgrade))
        .with_state(state)
        .layer(cors)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(allowed).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    }
}
