use crate::{api::AppState, errors::AppError};
use axum::{
    extract::{Query, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

// API DESIGN: Request Schema for Text Generation
// maxTokens and temperature are accepted for compatibility; sampling
// parameters are fixed by the backends.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: &'static str,
    pub text: String,
    pub prompt_length: usize,
    pub backend: String,
    pub request_id: String,
}

// ENDPOINT: POST /generate
pub async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected generate body: {}", rejection);
        AppError::InvalidInput("Request body must be JSON with a prompt field".to_string())
    })?;

    if request.max_tokens.is_some() || request.temperature.is_some() {
        tracing::debug!(
            max_tokens = ?request.max_tokens,
            temperature = ?request.temperature,
            "Ignoring per-request sampling parameters"
        );
    }
    run_generation(&state, request.prompt).await
}

// ENDPOINT: GET /generate?prompt=...
pub async fn generate_text_get(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<GenerateResponse>, AppError> {
    match query.prompt {
        Some(prompt) if !prompt.trim().is_empty() => run_generation(&state, Some(prompt)).await,
        _ => Err(AppError::InvalidInput(
            "Prompt cannot be null or empty".to_string(),
        )),
    }
}

async fn run_generation(
    state: &AppState,
    prompt: Option<String>,
) -> Result<Json<GenerateResponse>, AppError> {
    let request_start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let prompt_length = prompt.as_deref().map_or(0, |p| p.chars().count());

    tracing::info!(
        request_id = %request_id,
        prompt_length,
        "Received generation request"
    );

    let routed = state.generate(prompt.as_deref()).await.map_err(|e| {
        if e.is_client_error() {
            tracing::debug!(request_id = %request_id, "Prompt rejected: {}", e);
        } else {
            tracing::warn!(
                request_id = %request_id,
                category = e.category(),
                "Generation request failed"
            );
        }
        AppError::from(e)
    })?;

    tracing::info!(
        request_id = %request_id,
        backend = %routed.backend,
        elapsed_ms = request_start.elapsed().as_millis() as u64,
        "Request completed"
    );

    Ok(Json(GenerateResponse {
        status: "success",
        text: routed.text,
        prompt_length,
        backend: routed.backend,
        request_id,
    }))
}
