// ARCHITECTURE: Generation Failure Taxonomy
//
// Every way a generation request can fail is one variant of GenerationError.
// Callers branch on the variant, never on the message text. The HTTP layer
// (errors/app_error.rs) decides which variants are caller-correctable.

pub type Result<T> = std::result::Result<T, GenerationError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Null, empty, oversized or injection-looking prompt. Raised before any
    /// backend is touched.
    #[error("{0}")]
    InvalidPrompt(String),

    #[error("{0}")]
    ModelLoadFailed(String),

    /// The handle went back to the sentinel between load and use.
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Generation timeout: too many concurrent requests")]
    GenerationTimeout,

    #[error("Generation interrupted")]
    GenerationInterrupted,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Remote generation failed: {0}")]
    RemoteGenerationFailed(String),
}

impl GenerationError {
    /// Stable machine-readable kind, used in logs.
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::InvalidPrompt(_) => "invalid_prompt",
            GenerationError::ModelLoadFailed(_) => "model_load_failed",
            GenerationError::ModelNotLoaded => "model_not_loaded",
            GenerationError::GenerationTimeout => "generation_timeout",
            GenerationError::GenerationInterrupted => "generation_interrupted",
            GenerationError::GenerationFailed(_) => "generation_failed",
            GenerationError::RemoteGenerationFailed(_) => "remote_generation_failed",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, GenerationError::InvalidPrompt(_))
    }
}

/// Failure reported by a Native Generation Port call (the native layer
/// "threw"). The gate wraps it into the matching GenerationError variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NativeError(pub String);

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
