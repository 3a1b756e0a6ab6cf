// ARCHITECTURE: Model Access Gate - Single Owner of the Native Model Handle
//
// The gate is the only place that reads or writes the native model handle.
// It combines two independent controls:
//
// 1. SHARED/EXCLUSIVE ACCESS (tokio RwLock around the handle)
//    - generate() and status() hold shared access while calling the native layer
//    - the load path and shutdown() hold exclusive access, so no generation can
//      ever observe a half-loaded or half-unloaded handle
//
// 2. BOUNDED CONCURRENCY (tokio Semaphore, one permit per generation)
//    - shared access alone is unbounded; permits cap in-flight native calls
//    - waiting for a permit is bounded by the generation timeout (backpressure)
//    - waiting can be aborted through a CancellationToken
//
// HANDLE STATE MACHINE:
//   UNLOADED --load ok--> LOADED --shutdown--> UNLOADED
//   UNLOADED --load failed--> UNLOADED (retried by the next caller)
//
// Native calls run on the blocking pool. The lock guard and the permit are
// moved into the blocking closure, so a caller that stops waiting cannot
// release them while a native call is still running.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::error::{GenerationError, Result};
use crate::models::native::{ModelHandle, NativeGenerationPort};
use crate::models::sanitizer::PromptSanitizer;
use crate::models::traits::TextBackend;

pub const LOCAL_BACKEND_NAME: &str = "local_native";

/// Result of a status query. Never an error: load failures are described in `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub loaded: bool,
    pub info: String,
}

pub struct ModelAccessGate {
    port: Arc<dyn NativeGenerationPort>,
    sanitizer: PromptSanitizer,
    model_path: String,
    generation_timeout: Duration,
    max_concurrent_generations: usize,
    handle: Arc<RwLock<ModelHandle>>,
    permits: Arc<Semaphore>,
}

impl ModelAccessGate {
    /// Creates the gate with no model loaded. The first generation or status
    /// request triggers the load.
    pub fn new(port: Arc<dyn NativeGenerationPort>, config: &GateConfig) -> Self {
        let max_concurrent_generations = config.max_concurrent_generations.max(1);
        Self {
            port,
            sanitizer: PromptSanitizer::new(config.max_prompt_length),
            model_path: config.model_path.clone(),
            generation_timeout: config.generation_timeout(),
            max_concurrent_generations,
            handle: Arc::new(RwLock::new(ModelHandle::SENTINEL)),
            permits: Arc::new(Semaphore::new(max_concurrent_generations)),
        }
    }

    pub fn sanitizer(&self) -> &PromptSanitizer {
        &self.sanitizer
    }

    pub fn max_concurrent_generations(&self) -> usize {
        self.max_concurrent_generations
    }

    /// Permits not currently held by a generation.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Peeks at the handle without triggering a load.
    pub async fn is_loaded(&self) -> bool {
        !self.handle.read().await.is_sentinel()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    /// Generate text, aborting the permit wait when `cancel` fires.
    ///
    /// A cancelled wait fails with [`GenerationError::GenerationInterrupted`]
    /// and leaves the token cancelled for the caller to observe.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        // VALIDATION: nothing below runs for a rejected prompt
        let prompt = self.sanitizer.clean(Some(prompt))?;

        let permit = self.acquire_permit(cancel).await?;

        // The permit is dropped with this frame if loading fails.
        self.load_if_needed().await?;

        let guard = Arc::clone(&self.handle).read_owned().await;
        if guard.is_sentinel() {
            // Shut down between our load and our read.
            return Err(GenerationError::ModelNotLoaded);
        }

        let handle = *guard;
        let port = Arc::clone(&self.port);
        let started = Instant::now();
        let prompt_length = prompt.chars().count();

        let outcome = tokio::task::spawn_blocking(move || {
            let result = port.generate_text(handle, &prompt);
            drop(guard);
            drop(permit);
            result
        })
        .await;

        match outcome {
            Ok(Ok(text)) => {
                debug!(
                    handle = %handle,
                    prompt_length,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Native generation completed"
                );
                Ok(text)
            }
            Ok(Err(e)) => {
                error!(handle = %handle, "Native generation failed: {}", e);
                Err(GenerationError::GenerationFailed(e.to_string()))
            }
            Err(join_error) => {
                error!(handle = %handle, "Native generation task aborted: {}", join_error);
                Err(GenerationError::GenerationFailed(
                    "native generation aborted".to_string(),
                ))
            }
        }
    }

    async fn acquire_permit(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit> {
        let acquire = tokio::time::timeout(
            self.generation_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Generation interrupted while waiting for a permit");
                Err(GenerationError::GenerationInterrupted)
            }
            acquired = acquire => match acquired {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_closed)) => Err(GenerationError::GenerationInterrupted),
                Err(_elapsed) => {
                    warn!(
                        timeout_secs = self.generation_timeout.as_secs(),
                        max_concurrent = self.max_concurrent_generations,
                        "No generation permit within timeout"
                    );
                    Err(GenerationError::GenerationTimeout)
                }
            },
        }
    }

    /// Double-checked lazy load: cheap check under shared access, re-check
    /// and load under exclusive access.
    async fn load_if_needed(&self) -> Result<()> {
        if !self.handle.read().await.is_sentinel() {
            return Ok(());
        }

        let mut guard = Arc::clone(&self.handle).write_owned().await;
        if !guard.is_sentinel() {
            debug!("Model loaded by a concurrent caller");
            return Ok(());
        }

        let port = Arc::clone(&self.port);
        let model_path = self.model_path.clone();
        let started = Instant::now();
        info!(model_path = %model_path, "Loading model");

        // Exclusive access travels with the load so it stays held even if
        // this caller is cancelled mid-load.
        let outcome = tokio::task::spawn_blocking(move || {
            let loaded = port
                .load_model(&model_path)
                .map_err(|e| GenerationError::ModelLoadFailed(format!("Failed to load model: {e}")))?;
            if loaded.is_sentinel() {
                return Err(GenerationError::ModelLoadFailed(format!(
                    "Failed to load model from path: {model_path}"
                )));
            }
            *guard = loaded;
            Ok(loaded)
        })
        .await;

        match outcome {
            Ok(Ok(handle)) => {
                info!(
                    handle = %handle,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!("{}", e);
                Err(e)
            }
            Err(join_error) => {
                error!("Model load task aborted: {}", join_error);
                Err(GenerationError::ModelLoadFailed(
                    "Failed to load model: native load aborted".to_string(),
                ))
            }
        }
    }

    /// Reports whether a model is loaded, loading it first if needed.
    pub async fn status(&self) -> GateStatus {
        if let Some(status) = self.query_loaded().await {
            return status;
        }

        match self.load_if_needed().await {
            Ok(()) => self.query_loaded().await.unwrap_or_else(|| GateStatus {
                loaded: false,
                info: "Model not loaded".to_string(),
            }),
            Err(e) => GateStatus {
                loaded: false,
                info: format!("Model not loaded: {e}"),
            },
        }
    }

    // None when the handle is the sentinel.
    async fn query_loaded(&self) -> Option<GateStatus> {
        let guard = Arc::clone(&self.handle).read_owned().await;
        if guard.is_sentinel() {
            return None;
        }

        let port = Arc::clone(&self.port);
        let outcome = tokio::task::spawn_blocking(move || {
            let handle = *guard;
            let status = GateStatus {
                loaded: port.is_model_loaded(handle),
                info: port.model_info(handle),
            };
            drop(guard);
            status
        })
        .await;

        Some(outcome.unwrap_or_else(|join_error| {
            warn!("Model status query aborted: {}", join_error);
            GateStatus {
                loaded: false,
                info: "Model status unavailable".to_string(),
            }
        }))
    }

    /// Unloads the model. Never fails: native errors are logged and the
    /// handle is reset to the sentinel regardless.
    pub async fn shutdown(&self) {
        let mut guard = Arc::clone(&self.handle).write_owned().await;
        if guard.is_sentinel() {
            debug!("Shutdown requested with no model loaded");
            return;
        }

        let handle = std::mem::replace(&mut *guard, ModelHandle::SENTINEL);
        let port = Arc::clone(&self.port);

        let outcome = tokio::task::spawn_blocking(move || {
            let result = port.unload_model(handle);
            drop(guard);
            result
        })
        .await;

        match outcome {
            Ok(Ok(())) => info!(handle = %handle, "Model unloaded"),
            Ok(Err(e)) => warn!(handle = %handle, "Error unloading model: {}", e),
            Err(join_error) => warn!(handle = %handle, "Model unload task aborted: {}", join_error),
        }
    }
}

#[async_trait]
impl TextBackend for ModelAccessGate {
    fn name(&self) -> &str {
        LOCAL_BACKEND_NAME
    }

    fn describe(&self) -> String {
        format!("local model {}", self.model_path)
    }

    // Always willing: the model is loaded on demand.
    async fn available(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        ModelAccessGate::generate(self, prompt).await
    }
}
