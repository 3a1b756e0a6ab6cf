// IMPLEMENTATION: Remote llama-server Backend
//
// Talks to an external llama.cpp server over HTTP:
//   GET  {base}/health      readiness probe, bounded by the probe timeout
//   POST {base}/completion  non-streaming completion with fixed sampling
//
// Generation parameters are constants in this design; per-request maxTokens
// and temperature from the HTTP surface are not forwarded.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::{GenerationError, Result};
use crate::models::traits::TextBackend;

pub const REMOTE_BACKEND_NAME: &str = "remote_llama_server";

// SAMPLING: fixed completion parameters
pub const N_PREDICT: u32 = 256;
pub const TEMPERATURE: f32 = 0.7;
pub const TOP_P: f32 = 0.9;
pub const TOP_K: u32 = 40;
pub const REPEAT_PENALTY: f32 = 1.1;

/// llama.cpp `/completion` request body.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub n_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    pub stream: bool,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            n_predict: N_PREDICT,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            repeat_penalty: REPEAT_PENALTY,
            stream: false,
        }
    }
}

/// The part of the llama.cpp completion response we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tokens_predicted: usize,
}

pub struct RemoteBackendClient {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl RemoteBackendClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::RemoteGenerationFailed(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn probe(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "llama-server not ready");
                false
            }
            Err(e) => {
                debug!("llama-server unreachable: {}", e);
                false
            }
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/completion", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&CompletionRequest::new(prompt))
            .send()
            .await
            .map_err(|e| remote_failure(format!("request to llama-server failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_failure(format!("llama-server responded with status {status}")));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| remote_failure(format!("unparseable llama-server response: {e}")))?;

        let content = body
            .content
            .ok_or_else(|| remote_failure("No content in response".to_string()))?;

        debug!(tokens_predicted = body.tokens_predicted, "Remote completion received");
        Ok(content.trim().to_string())
    }
}

fn remote_failure(reason: String) -> GenerationError {
    warn!("{}", reason);
    GenerationError::RemoteGenerationFailed(reason)
}

#[async_trait]
impl TextBackend for RemoteBackendClient {
    fn name(&self) -> &str {
        REMOTE_BACKEND_NAME
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn available(&self) -> bool {
        self.probe().await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }
}
