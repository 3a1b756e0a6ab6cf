// ARCHITECTURE: API Module - REST Surface
//
// Thin handlers over the RequestRouter. Handlers parse input, delegate, and
// map outcomes to JSON envelopes; every generation decision lives in models/.
//
//   POST /generate   text generation, JSON body {prompt, maxTokens?, temperature?}
//   GET  /generate   text generation, ?prompt=...
//   GET  /status     backend and model status
//   POST /reload     unload the local model (lazy reload on next request)
//   GET  /health     liveness

pub mod generate;
pub mod health;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::models::RequestRouter;

pub type AppState = Arc<RequestRouter>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/generate",
            post(generate::generate_text).get(generate::generate_text_get),
        )
        .route("/status", get(health::status))
        .route("/reload", post(health::reload))
        .with_state(state)
}
