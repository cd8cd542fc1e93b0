//! Configuration for hosted LLM providers.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Groq's OpenAI-compatible API root.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Configuration for remote LLM providers.
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, without a trailing slash.
    ///
    /// Example: "https://api.groq.com/openai/v1"
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for failed requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RemoteLlmConfig {
    /// Create a new remote LLM configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Create configuration from environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    /// Groq configuration with the key from `GROQ_API_KEY`.
    pub fn groq_from_env(model: impl Into<String>) -> Result<Self> {
        Self::from_env(GROQ_API_KEY_ENV, GROQ_BASE_URL, model)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check that the configuration can be used to build a client.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound("API key is empty".to_string()));
        }
        if self.base_url.is_empty() {
            return Err(LlmError::ConfigError("base_url is empty".to_string()));
        }
        if self.model.is_empty() {
            return Err(LlmError::ConfigError("model is empty".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RemoteLlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteLlmConfig::new("test-key", "https://api.groq.com/openai/v1/", "gemma2-9b-it")
            .with_timeout(Duration::from_secs(120))
            .with_max_retries(5);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, GROQ_BASE_URL);
        assert_eq!(config.model, "gemma2-9b-it");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_env_var() {
        let result = RemoteLlmConfig::from_env(
            "CHAT_MEMORY_TEST_KEY_THAT_IS_NOT_SET",
            GROQ_BASE_URL,
            "gemma2-9b-it",
        );
        assert!(matches!(result, Err(LlmError::ApiKeyNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let config = RemoteLlmConfig::new("", GROQ_BASE_URL, "gemma2-9b-it");
        assert!(config.validate().unwrap_err().is_auth_error());

        let config = RemoteLlmConfig::new("key", GROQ_BASE_URL, "");
        assert!(matches!(config.validate(), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = RemoteLlmConfig::new("gsk_secret", GROQ_BASE_URL, "gemma2-9b-it");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("gsk_secret"));
    }
}
