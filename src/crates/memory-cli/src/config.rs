//! Configuration schema and layered loader
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.chat-memory/config.toml
//! 3. Project-level config: ./.chat-memory/config.toml
//! 4. An explicit `--config` path
//!
//! Later layers override earlier ones, one section at a time. A missing user
//! or project file is skipped; a missing explicit file is an error.
//!
//! ```toml
//! [chat]
//! session = "chat1"
//! system_prompt = "You are a helpful assistant."
//! token_counter = "tiktoken"
//!
//! [trim]
//! max_tokens = 45
//! start_on = "human"
//!
//! [llm]
//! provider = "groq"
//! model = "gemma2-9b-it"
//! api_key = "${GROQ_API_KEY}"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use llm::config::{GROQ_API_KEY_ENV, GROQ_BASE_URL};
use memory_core::TrimConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const CONFIG_DIR: &str = ".chat-memory";
const CONFIG_FILE: &str = "config.toml";

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMemoryConfig {
    #[serde(default)]
    pub chat: ChatSection,

    #[serde(default)]
    pub trim: TrimConfig,

    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Conversation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Session used when `--session` is not given
    pub session: String,

    /// Instructions prepended to every window sent to the model
    pub system_prompt: Option<String>,

    /// How message costs are computed for trimming
    pub token_counter: CounterKind,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            session: "chat1".to_string(),
            system_prompt: Some(
                "You are a helpful assistant. Answer all questions accurately in the user's language."
                    .to_string(),
            ),
            token_counter: CounterKind::Tiktoken,
        }
    }
}

/// Token counting backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// BPE counting (`cl100k_base`)
    Tiktoken,
    /// Four characters per token
    Approximate,
}

/// Chat model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Groq hosted models
    Groq,
    /// Offline model that repeats the input
    Echo,
}

/// Model provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,

    /// API key, or `${VAR}` to read it from the environment
    pub api_key: String,

    /// HTTP timeout per request
    pub timeout_secs: u64,

    /// Provider-level retries for rate limits and transport errors
    pub max_retries: u32,

    /// Deadline for one whole model call, retries included
    pub invoke_timeout_secs: Option<u64>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq,
            model: "gemma2-9b-it".to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            api_key: format!("${{{}}}", GROQ_API_KEY_ENV),
            timeout_secs: 60,
            max_retries: 3,
            invoke_timeout_secs: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// One config file; absent sections leave earlier layers untouched
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    chat: Option<ChatSection>,
    trim: Option<TrimConfig>,
    llm: Option<LlmSection>,
    logging: Option<LoggingSection>,
}

impl ChatMemoryConfig {
    /// Parse a TOML document as a complete config over defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge(toml::from_str(content).context("Failed to parse config")?);
        Ok(config)
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(chat) = layer.chat {
            self.chat = chat;
        }
        if let Some(trim) = layer.trim {
            self.trim = trim;
        }
        if let Some(llm) = layer.llm {
            self.llm = llm;
        }
        if let Some(logging) = layer.logging {
            self.logging = logging;
        }
    }

    /// Resolve `${VAR}` references in string fields
    pub fn resolve_env_vars(&mut self) {
        self.llm.api_key = expand_env_var(&self.llm.api_key);
        self.llm.base_url = expand_env_var(&self.llm.base_url);
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.trim.validate().context("Invalid [trim] section")?;
        if self.llm.timeout_secs == 0 {
            bail!("Invalid [llm] section: timeout_secs must be greater than zero");
        }
        if self.llm.invoke_timeout_secs == Some(0) {
            bail!("Invalid [llm] section: invoke_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Expand a whole-value `${VAR}` reference; unset variables resolve to ""
fn expand_env_var(value: &str) -> String {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => value.to_string(),
    }
}

/// Configuration loader that handles user, project and explicit configs
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: PathBuf::from(CONFIG_DIR).join(CONFIG_FILE),
        }
    }

    /// Create a loader with custom user and project locations
    pub fn with_paths(user_config_path: Option<PathBuf>, project_config_path: PathBuf) -> Self {
        Self {
            user_config_path,
            project_config_path,
        }
    }

    /// Load all layers, resolve environment references and validate
    pub async fn load(&self, explicit: Option<&Path>) -> Result<ChatMemoryConfig> {
        let mut config = ChatMemoryConfig::default();

        let optional = self
            .user_config_path
            .iter()
            .chain(std::iter::once(&self.project_config_path));
        for path in optional {
            if !path.exists() {
                debug!(path = %path.display(), "Config file not found, skipping");
                continue;
            }
            config.merge(Self::load_layer(path).await?);
            debug!(path = %path.display(), "Loaded config layer");
        }

        if let Some(path) = explicit {
            config.merge(Self::load_layer(path).await?);
            debug!(path = %path.display(), "Loaded explicit config");
        }

        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    async fn load_layer(path: &Path) -> Result<ConfigLayer> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// User config path, if a home directory is known
    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    /// Project config path
    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
