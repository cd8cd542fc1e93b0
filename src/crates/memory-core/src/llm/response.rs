//! Response types for chat model calls.

use crate::messages::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A complete reply from a chat model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The reply message. Pipelines append it to history as-is.
    pub message: Message,

    /// Token usage reported by the provider, if any.
    pub usage: Option<UsageMetadata>,

    /// Provider-specific details (model name, finish reason, ...).
    pub metadata: HashMap<String, Value>,
}

impl ChatResponse {
    /// Wrap a reply message with no usage or metadata.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach usage statistics.
    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Token usage of one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Prompt tokens.
    pub input_tokens: usize,
    /// Completion tokens.
    pub output_tokens: usize,
    /// Sum of the two.
    pub total_tokens: usize,
}

impl UsageMetadata {
    /// Build usage from prompt and completion counts.
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}
