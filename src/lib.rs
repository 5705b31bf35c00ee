pub mod backend;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod modes;
pub mod orchestrator;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use backend::ollama::OllamaClient;
use config::Settings;
use tracing::info;

pub fn build_state() -> Result<state::AppState, std::io::Error> {
    let settings = Arc::new(Settings::from_env());
    let client = OllamaClient::new(settings.clone()).map_err(std::io::Error::other)?;
    info!(
        base_url = %settings.base_url,
        model = %settings.model,
        fallback_first = settings.fallback_first,
        fallback_delay_secs = settings.fallback_delay.as_secs(),
        "generation backend configured"
    );
    Ok(state::AppState::new(Arc::new(client), settings))
}

pub fn build_app(state: state::AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/modes", get(handlers::modes))
        .route("/explain", post(handlers::explain))
        .route("/explain/stream", post(handlers::explain_stream))
        .with_state(state)
}
