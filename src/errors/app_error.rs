use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::GenerationError;

pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected by the handler before reaching the router.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Details are logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status, category and client-facing message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, "Invalid input", message.clone())
            }
            AppError::Generation(error) => match error {
                GenerationError::InvalidPrompt(message) => {
                    (StatusCode::BAD_REQUEST, "Invalid input", message.clone())
                }
                GenerationError::GenerationTimeout => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Generation failed",
                    error.to_string(),
                ),
                GenerationError::ModelLoadFailed(_)
                | GenerationError::ModelNotLoaded
                | GenerationError::GenerationInterrupted
                | GenerationError::GenerationFailed(_) => {
                    (StatusCode::BAD_REQUEST, "Generation failed", error.to_string())
                }
                GenerationError::RemoteGenerationFailed(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    INTERNAL_ERROR_MESSAGE.to_string(),
                ),
            },
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();

        if status.is_server_error() {
            tracing::error!("{} ({}): {}", error, status.as_u16(), self);
        } else {
            tracing::warn!("{} ({}): {}", error, status.as_u16(), message);
        }

        let body = Json(json!({
            "status": "error",
            "error": error,
            "message": message,
            "timestamp": chrono::Utc::now().timestamp_millis()
        }));

        (status, body).into_response()
    }
}
