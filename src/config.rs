use serde::{Deserialize, Serialize};
use std::{env, net::IpAddr, str::FromStr, time::Duration};

pub const DEFAULT_MODEL_PATH: &str = "Llama-3.2-3B-Instruct-Q3_K_L.gguf";
pub const DEFAULT_LLAMA_SERVER_URL: &str = "http://127.0.0.1:8081";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gate: GateConfig,
    pub remote: RemoteConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// Settings for the local model access gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub model_path: String,
    pub max_prompt_length: usize,
    pub generation_timeout_seconds: u64,
    pub max_concurrent_generations: usize,
}

/// Settings for the remote llama-server client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub probe_timeout_ms: u64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    pub retry_local_on_remote_failure: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            max_prompt_length: 4000,
            generation_timeout_seconds: 30,
            max_concurrent_generations: 5,
        }
    }
}

impl ServerConfig {
    /// HOST must be a literal IP address.
    pub fn bind_ip(&self) -> anyhow::Result<IpAddr> {
        self.host
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("HOST must be an IP address, got {:?}", self.host))
    }
}

impl GateConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLAMA_SERVER_URL.to_string(),
            probe_timeout_ms: 2000,
            request_timeout_seconds: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let gate = GateConfig::default();
        let remote = RemoteConfig::default();
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PORT", 8080),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            gate: GateConfig {
                model_path: env::var("LLAMA_MODEL_PATH").unwrap_or(gate.model_path),
                max_prompt_length: env_or("LLAMA_MAX_PROMPT_LENGTH", gate.max_prompt_length),
                generation_timeout_seconds: env_or(
                    "LLAMA_GENERATION_TIMEOUT_SECONDS",
                    gate.generation_timeout_seconds,
                ),
                max_concurrent_generations: env_or(
                    "LLAMA_MAX_CONCURRENT_GENERATIONS",
                    gate.max_concurrent_generations,
                ),
            },
            remote: RemoteConfig {
                base_url: env::var("LLAMA_SERVER_URL").unwrap_or(remote.base_url),
                probe_timeout_ms: env_or("LLAMA_SERVER_PROBE_TIMEOUT_MS", remote.probe_timeout_ms),
                request_timeout_seconds: env_or(
                    "LLAMA_SERVER_REQUEST_TIMEOUT_SECONDS",
                    remote.request_timeout_seconds,
                ),
            },
            router: RouterConfig {
                retry_local_on_remote_failure: env_or("ROUTER_RETRY_LOCAL_ON_REMOTE_FAILURE", false),
            },
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.bind_ip()?;
        if self.gate.model_path.trim().is_empty() {
            anyhow::bail!("LLAMA_MODEL_PATH must not be empty");
        }
        if self.gate.max_prompt_length == 0 {
            anyhow::bail!("LLAMA_MAX_PROMPT_LENGTH must be at least 1");
        }
        if self.gate.generation_timeout_seconds == 0 {
            anyhow::bail!("LLAMA_GENERATION_TIMEOUT_SECONDS must be at least 1");
        }
        if self.gate.max_concurrent_generations == 0 {
            anyhow::bail!("LLAMA_MAX_CONCURRENT_GENERATIONS must be at least 1");
        }
        if self.remote.base_url.trim().is_empty() {
            anyhow::bail!("LLAMA_SERVER_URL must not be empty");
        }
        Ok(())
    }
}

// Unset or unparseable values fall back to the default.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
