use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DistributionError, Result};

/// Call distribution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// General settings
    pub general: GeneralConfig,

    /// Wait queue and queue processor configuration
    pub queue: QueueConfig,

    /// Agent registry configuration
    pub agents: AgentConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// HTTP API configuration
    pub api: ApiConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

/// Queue processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Follow-up drain delay after a pass that leaves work queued (milliseconds)
    pub retry_interval_ms: u64,

    /// Retry delay after a pass aborted by an error (milliseconds)
    pub error_backoff_ms: u64,
}

/// Agent registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Lowest accepted priority weight; stored values below are clamped
    pub min_priority: i64,

    /// Highest accepted priority weight; stored values above are clamped
    pub max_priority: i64,

    /// Maximum length of a skill tag
    pub max_skill_len: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL (`sqlite::memory:` for in-memory)
    pub url: String,

    /// Maximum pooled connections for file-backed databases
    pub max_connections: u32,
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address for the HTTP API
    pub bind_address: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_priority: 0,
            max_priority: 100,
            max_skill_len: 64,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 4,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8085".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl DistributionConfig {
    /// Parse a configuration from TOML text. Missing sections use defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| DistributionError::config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DistributionError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.queue.retry_interval_ms == 0 {
            return Err(DistributionError::config("queue.retry_interval_ms must be greater than 0"));
        }

        if self.queue.error_backoff_ms < self.queue.retry_interval_ms {
            return Err(DistributionError::config(
                "queue.error_backoff_ms cannot be shorter than queue.retry_interval_ms",
            ));
        }

        if self.agents.min_priority > self.agents.max_priority {
            return Err(DistributionError::config(format!(
                "agents.min_priority ({}) exceeds agents.max_priority ({})",
                self.agents.min_priority, self.agents.max_priority
            )));
        }

        if self.agents.max_skill_len == 0 {
            return Err(DistributionError::config("agents.max_skill_len must be greater than 0"));
        }

        if self.database.url.is_empty() {
            return Err(DistributionError::config("database.url cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(DistributionError::config("database.max_connections must be greater than 0"));
        }

        self.api
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| DistributionError::config(format!("Invalid api.bind_address {}: {}", self.api.bind_address, e)))?;

        Ok(())
    }
}
