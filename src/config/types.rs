use serde::{Deserialize, Serialize};

use crate::errors::ChainscanError;
use crate::retry::RetryPolicy;

/// Complete engine configuration. Constructed once (file + CLI overrides)
/// and passed by reference into every component; no component reads
/// ambient global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub oracle: OracleConfig,
    pub cache: CacheConfig,
    pub retry: RetrySettings,
    pub transport: TransportSettings,
    pub run: RunSettings,
}

/// Oracle provider selection and request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Never stored in the file.
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 4096,
        }
    }
}

impl OracleConfig {
    pub fn resolve_api_key(&self) -> Result<String, ChainscanError> {
        std::env::var(&self.api_key_env).map_err(|_| {
            ChainscanError::Authentication(format!(
                "API key not found in environment variable {}",
                self.api_key_env
            ))
        })
    }
}

/// Prefix cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Protocol-level (content) retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub policy: RetryPolicy,
    /// Hard cap on correction re-queries per position.
    pub max_attempts: u32,
    /// Escalating corrections allowed for empty responses before the chain
    /// is marked failed.
    pub empty_response_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::Intelligent,
            max_attempts: 2,
            empty_response_attempts: 2,
        }
    }
}

/// Transport retry budget around each oracle call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub max_retries: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Batch execution shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Concurrent chain workers. One chain always walks sequentially;
    /// parallelism exists only across chains.
    pub workers: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl EngineConfig {
    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), ChainscanError> {
        if self.run.workers == 0 {
            return Err(ChainscanError::Config("run.workers must be at least 1".into()));
        }
        if self.cache.capacity == 0 {
            return Err(ChainscanError::Config("cache.capacity must be at least 1".into()));
        }
        if self.retry.max_attempts > 10 {
            return Err(ChainscanError::Config(
                "retry.max_attempts above 10 is almost certainly a mistake".into(),
            ));
        }
        Ok(())
    }
}
