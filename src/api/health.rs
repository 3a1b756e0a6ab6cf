use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};

// Liveness only: touches no backend.
pub async fn health_check() -> (StatusCode, Json<Value>) {
    let response = json!({
        "status": "healthy",
        "service": "llama-gate-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp_millis()
    });

    (StatusCode::OK, Json(response))
}

// ENDPOINT: GET /status
// Reports which backend would serve the next request. Loading failures show
// up in model_status, never as an error response.
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let status = state.status().await;

    let response = json!({
        "status": "healthy",
        "model_loaded": status.model_loaded,
        "model_status": status.model_status,
        "real_llama_available": status.real_llama_available,
        "mode": status.mode,
    });

    (StatusCode::OK, Json(response))
}

// ENDPOINT: POST /reload
// Unloads the local model; the next local request loads it again.
pub async fn reload(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.reload().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Model reload initiated"
        })),
    )
}
