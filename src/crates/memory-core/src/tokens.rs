//! Token counting capability
//!
//! Trimming needs to know what each message costs. The cost comes from a
//! [`TokenCounter`], an injected capability that may be slow (a remote
//! tokenizer, the model itself) or fail. The trimmer calls it once per
//! candidate message per trim and does not cache results.
//!
//! Two local counters ship with the crate:
//!
//! - [`TiktokenCounter`] - BPE counting with the `cl100k_base` encoding
//! - [`ApproximateCounter`] - character-ratio estimate, never fails
//!
//! Both charge a fixed [`MESSAGE_OVERHEAD_TOKENS`] per message for the role
//! marker and chat framing.

use crate::error::{MemoryError, Result};
use crate::messages::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Tokens charged per message for role and formatting
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Computes the token cost of messages.
///
/// Implementations must be deterministic for a given message content, or
/// trimming stops being reproducible.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Total token cost of a sequence of messages
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize>;

    /// Token cost of a single message
    async fn count_message(&self, message: &Message) -> Result<usize> {
        self.count_tokens(std::slice::from_ref(message)).await
    }
}

#[async_trait]
impl<T: TokenCounter + ?Sized> TokenCounter for Arc<T> {
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        (**self).count_tokens(messages).await
    }

    async fn count_message(&self, message: &Message) -> Result<usize> {
        (**self).count_message(message).await
    }
}

/// BPE token counter backed by tiktoken's `cl100k_base` encoding
#[derive(Clone)]
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    /// Load the `cl100k_base` encoding
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| MemoryError::token_counter(format!("failed to load tokenizer: {}", e)))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Tokens in a bare string, without message overhead
    pub fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

#[async_trait]
impl TokenCounter for TiktokenCounter {
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        Ok(messages
            .iter()
            .map(|m| self.count_text(m.content()) + MESSAGE_OVERHEAD_TOKENS)
            .sum())
    }
}

/// Character-ratio token estimate
///
/// Cheap and infallible; roughly matches BPE tokenizers on English text.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateCounter {
    chars_per_token: f32,
}

impl ApproximateCounter {
    /// Estimate with a custom characters-per-token ratio
    ///
    /// Ratios below 1.0 are clamped to 1.0.
    pub fn new(chars_per_token: f32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1.0),
        }
    }

    /// Estimated tokens in a bare string
    pub fn count_text(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars as f32 / self.chars_per_token).ceil() as usize
    }
}

impl Default for ApproximateCounter {
    fn default() -> Self {
        Self::new(4.0)
    }
}

#[async_trait]
impl TokenCounter for ApproximateCounter {
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        Ok(messages
            .iter()
            .map(|m| self.count_text(m.content()) + MESSAGE_OVERHEAD_TOKENS)
            .sum())
    }
}
