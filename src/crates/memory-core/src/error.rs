//! Error types for conversation memory operations
//!
//! Every failure below [`HistoryPipeline`](crate::HistoryPipeline) surfaces as a
//! [`MemoryError`]. Nothing is retried or swallowed here; retry policy belongs
//! to whoever calls `invoke`.
//!
//! # Error Hierarchy
//!
//! ```text
//! MemoryError
//! ├── Configuration   - Invalid trim/pipeline configuration (raised at build time)
//! ├── Model           - The chat model call failed (transport, quota, auth, ...)
//! ├── TokenCounter    - The token counting capability failed
//! ├── Timeout         - The chat model call exceeded its deadline
//! ├── MissingReply    - A pipeline finished without producing a reply
//! ├── InvalidMessage  - A message could not be built from raw input
//! └── Serialization   - JSON encoding/decoding of messages failed
//! ```
//!
//! # Session State After a Failure
//!
//! A failed `invoke` leaves the session log holding the input message that was
//! appended before the failure and nothing else:
//!
//! ```rust,ignore
//! match pipeline.invoke("chat1", Message::human("hi")).await {
//!     Ok(reply) => println!("{}", reply.content()),
//!     Err(e) if e.is_retryable() => {
//!         // history now ends with the human message; no reply was recorded
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors that can occur while storing, trimming, or invoking a conversation
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration rejected while building a pipeline
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external chat model failed
    #[error("Model invocation failed: {0}")]
    Model(String),

    /// The token counting capability failed
    #[error("Token counter failed: {0}")]
    TokenCounter(String),

    /// The chat model did not answer in time
    #[error("Model invocation timed out after {0:?}")]
    Timeout(Duration),

    /// A pipeline ran to completion but no stage produced a reply
    #[error("Pipeline finished without a reply for session '{session_id}'")]
    MissingReply {
        /// Session the pipeline was running for
        session_id: String,
    },

    /// Raw input could not be turned into a message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a model invocation error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a token counter error
    pub fn token_counter(msg: impl Into<String>) -> Self {
        Self::TokenCounter(msg.into())
    }

    /// Whether calling `invoke` again for the same session may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemoryError::Model(_) | MemoryError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::configuration("max_tokens must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: max_tokens must be greater than zero"
        );

        let err = MemoryError::MissingReply {
            session_id: "chat1".to_string(),
        };
        assert!(err.to_string().contains("chat1"));
    }

    #[test]
    fn test_retryable() {
        assert!(MemoryError::model("quota exceeded").is_retryable());
        assert!(MemoryError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!MemoryError::configuration("bad").is_retryable());
        assert!(!MemoryError::token_counter("down").is_retryable());
    }

    #[test]
    fn test_from_serde_error() {
        let err: MemoryError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, MemoryError::Serialization(_)));
    }
}
