//! Hosted chat model providers for chat-memory.
//!
//! This crate provides concrete implementations of the `ChatModel` trait from
//! `memory-core`.
//!
//! # Remote Providers
//!
//! - **Groq** - low-latency hosted open models (Gemma, Llama, Mixtral) behind
//!   an OpenAI-compatible API
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::remote::GroqClient;
//! use llm::config::RemoteLlmConfig;
//! use memory_core::{ChatModel, ChatRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::groq_from_env("gemma2-9b-it")?;
//!     let client = GroqClient::new(config)?;
//!
//!     let request = ChatRequest::new(vec![
//!         Message::human("Hi! I'm Bob")
//!     ]);
//!
//!     let response = client.chat(request).await?;
//!     println!("Response: {}", response.message.content());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod remote;

// Re-export commonly used types
pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use remote::GroqClient;

// Re-export memory-core types for convenience
pub use memory_core::llm::{ChatConfig, ChatModel, ChatRequest, ChatResponse, UsageMetadata};
pub use memory_core::Message;
