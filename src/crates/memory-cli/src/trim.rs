//! Offline trimming of a saved conversation

use anyhow::{Context, Result};
use memory_core::{trim_messages, Message, TokenCounter, TrimConfig};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Parse a JSON array of `{"role": ..., "content": ...}` objects
///
/// `id` is optional; roles accept `user` and `assistant` as aliases.
pub fn parse_messages(json: &str) -> Result<Vec<Message>> {
    serde_json::from_str(json).context("Expected a JSON array of messages")
}

/// Trim the conversation stored at `path` and render the window as JSON
pub async fn trim_file(
    path: &Path,
    config: &TrimConfig,
    counter: &dyn TokenCounter,
) -> Result<String> {
    config.validate()?;

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let messages = parse_messages(&content)?;

    let window = trim_messages(&messages, config, counter).await?;
    let tokens = counter.count_tokens(&window).await?;
    debug!(
        input = messages.len(),
        kept = window.len(),
        tokens,
        "Trimmed conversation file"
    );

    Ok(serde_json::to_string_pretty(&window)?)
}
