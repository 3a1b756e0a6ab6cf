// ARCHITECTURE: Trait-Based Backend Abstraction
//
// Both text-generation providers, the local model access gate and the remote
// llama-server client, sit behind TextBackend so the request router can pick
// one per request without knowing which it holds.

use async_trait::async_trait;

use crate::error::Result;

/// Unified interface for a text-generation backend.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short identifier reported in success envelopes and logs.
    fn name(&self) -> &str;

    /// Human-readable location or description, used by status reporting.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Bounded-time readiness check. Never fails; problems read as `false`.
    async fn available(&self) -> bool;

    /// Generate text for a raw prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
