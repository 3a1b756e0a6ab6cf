//! RequestRouter: backend selection per generation request.
//!
//! ```text
//!   prompt ──▶ validate ──▶ remote available? ──YES──▶ remote.generate(sanitized)
//!                               │                         │ failed
//!                               NO                        ├── Commit: return the error
//!                               ▼                         └── RetryLocal: fall through
//!                        local gate.generate(prompt) ◀────────┘
//! ```
//!
//! Availability is checked once per request. The router owns the fallback
//! decision; neither backend retries on its own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::error::Result;
use crate::models::gate::ModelAccessGate;
use crate::models::sanitizer::sanitize;
use crate::models::traits::TextBackend;

/// What happens when the remote backend was available at request start but
/// the generation call to it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFailurePolicy {
    /// Return the remote failure to the caller.
    #[default]
    Commit,
    /// Retry the same request once on the local gate.
    RetryLocal,
}

impl From<&RouterConfig> for RemoteFailurePolicy {
    fn from(config: &RouterConfig) -> Self {
        if config.retry_local_on_remote_failure {
            RemoteFailurePolicy::RetryLocal
        } else {
            RemoteFailurePolicy::Commit
        }
    }
}

/// Successful generation plus the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedGeneration {
    pub text: String,
    pub backend: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    RealLlama,
    EnhancedMock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub model_loaded: bool,
    pub model_status: String,
    pub real_llama_available: bool,
    pub mode: ServiceMode,
}

pub struct RequestRouter {
    remote: Arc<dyn TextBackend>,
    local: Arc<ModelAccessGate>,
    policy: RemoteFailurePolicy,
}

impl RequestRouter {
    pub fn new(
        remote: Arc<dyn TextBackend>,
        local: Arc<ModelAccessGate>,
        policy: RemoteFailurePolicy,
    ) -> Self {
        Self {
            remote,
            local,
            policy,
        }
    }

    pub fn policy(&self) -> RemoteFailurePolicy {
        self.policy
    }

    pub fn local(&self) -> &Arc<ModelAccessGate> {
        &self.local
    }

    /// Route one request. Invalid prompts are rejected before any backend,
    /// including the availability probe, is touched.
    pub async fn generate(&self, prompt: Option<&str>) -> Result<RoutedGeneration> {
        let prompt = self.local.sanitizer().validate(prompt)?;

        if self.remote.available().await {
            debug!(backend = self.remote.name(), "Remote backend available");
            match self.remote.generate(&sanitize(prompt)).await {
                Ok(text) => {
                    return Ok(RoutedGeneration {
                        text,
                        backend: self.remote.name().to_string(),
                    });
                }
                Err(e) if self.policy == RemoteFailurePolicy::RetryLocal => {
                    warn!(
                        category = e.category(),
                        "Remote generation failed, retrying on local gate"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let text = self.local.generate(prompt).await?;
        Ok(RoutedGeneration {
            text,
            backend: self.local.name().to_string(),
        })
    }

    pub async fn status(&self) -> ServiceStatus {
        if self.remote.available().await {
            return ServiceStatus {
                model_loaded: true,
                model_status: format!("Real LLaMA server running on {}", self.remote.describe()),
                real_llama_available: true,
                mode: ServiceMode::RealLlama,
            };
        }

        let local = self.local.status().await;
        ServiceStatus {
            model_loaded: local.loaded,
            model_status: local.info,
            real_llama_available: false,
            mode: ServiceMode::EnhancedMock,
        }
    }

    /// Unloads the local model; the next local request loads it again.
    pub async fn reload(&self) {
        info!("Model reload requested");
        self.local.shutdown().await;
    }
}
