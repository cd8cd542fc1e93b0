//! # memory-cli
//!
//! Process glue for the `chat-memory` binary: configuration loading, model
//! and token counter selection, the interactive chat loop, and offline
//! trimming.

pub mod chat;
pub mod config;
pub mod echo;
pub mod trim;

use anyhow::{bail, Context, Result};
use config::{ChatMemoryConfig, CounterKind, LlmSection, ProviderKind};
use echo::EchoModel;
use llm::{GroqClient, RemoteLlmConfig};
use memory_core::{
    ApproximateCounter, ChatConfig, ChatModel, HistoryPipeline, TiktokenCounter, TokenCounter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Instantiate the configured chat model
pub fn build_model(llm: &LlmSection) -> Result<Arc<dyn ChatModel>> {
    match llm.provider {
        ProviderKind::Echo => Ok(Arc::new(EchoModel)),
        ProviderKind::Groq => {
            if llm.api_key.trim().is_empty() {
                bail!(
                    "No Groq API key: set {} or [llm].api_key",
                    llm::config::GROQ_API_KEY_ENV
                );
            }
            let config = RemoteLlmConfig::new(&llm.api_key, &llm.base_url, &llm.model)
                .with_timeout(Duration::from_secs(llm.timeout_secs))
                .with_max_retries(llm.max_retries);
            let client = GroqClient::new(config).context("Failed to create Groq client")?;
            Ok(Arc::new(client))
        }
    }
}

/// Instantiate the configured token counter
pub fn build_counter(kind: CounterKind) -> Result<Arc<dyn TokenCounter>> {
    Ok(match kind {
        CounterKind::Tiktoken => Arc::new(TiktokenCounter::new()?),
        CounterKind::Approximate => Arc::new(ApproximateCounter::default()),
    })
}

/// Assemble a history pipeline from a loaded configuration
pub fn build_pipeline(config: &ChatMemoryConfig) -> Result<HistoryPipeline> {
    let model = build_model(&config.llm)?;
    let counter = build_counter(config.chat.token_counter)?;

    let chat_config = ChatConfig {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
        stop_sequences: Vec::new(),
    };

    let mut builder = HistoryPipeline::builder(model, counter)
        .trim_config(config.trim.clone())
        .chat_config(chat_config);

    if let Some(prompt) = config
        .chat
        .system_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        builder = builder.system_prompt(prompt);
    }
    if let Some(secs) = config.llm.invoke_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    let pipeline = builder.build().context("Invalid pipeline configuration")?;
    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        max_tokens = config.trim.max_tokens,
        "Pipeline ready"
    );
    Ok(pipeline)
}
