//! # memory-core - Session-Scoped Conversational Memory
//!
//! Keeps the message history of many independent chat sessions and feeds each
//! model call a token-budgeted window of that history.
//!
//! ## Overview
//!
//! - **Session store** - one append-only message log per session ID, created
//!   on first use
//! - **Trimming** - keep the most recent messages that fit a token budget,
//!   optionally preserving the leading system message
//! - **History pipeline** - append input, trim, call the model, append reply,
//!   atomically per session
//!
//! ## Core Concepts
//!
//! ### 1. Messages
//!
//! [`Message`] is an immutable `(role, content)` value with a generated ID.
//! Roles form the closed set [`MessageRole::System`], [`MessageRole::Human`]
//! and [`MessageRole::Ai`].
//!
//! ### 2. Trimming
//!
//! [`trim_messages`] walks the history from newest to oldest and keeps the
//! longest trailing run whose token cost fits [`TrimConfig::max_tokens`]. The
//! window is then advanced to the first message whose role matches
//! [`TrimConfig::start_on`]. Costs come from a [`TokenCounter`].
//!
//! ### 3. History Pipeline
//!
//! [`HistoryPipeline`] composes trimming, an optional system prompt, and a
//! [`ChatModel`] call. The full history is never truncated; only the window
//! sent to the model is.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use memory_core::{HistoryPipeline, Message, TiktokenCounter, TrimConfig};
//! use std::sync::Arc;
//!
//! let pipeline = HistoryPipeline::builder(model, Arc::new(TiktokenCounter::new()?))
//!     .trim_config(TrimConfig::new(45))
//!     .system_prompt("You are a helpful assistant. Answer all questions to the best of your ability.")
//!     .build()?;
//!
//! let reply = pipeline.invoke("chat1", Message::human("Hi! I'm Bob")).await?;
//! let reply = pipeline.invoke("chat1", Message::human("What's my name?")).await?;
//!
//! // A different session knows nothing about Bob
//! let reply = pipeline.invoke("chat2", Message::human("What's my name?")).await?;
//! ```
//!
//! ## Concurrency
//!
//! All types are `Send + Sync`. Calls on the same session are serialized for
//! the whole append-trim-invoke-append sequence; calls on different sessions
//! never wait on each other.

pub mod error;
pub mod history;
pub mod llm;
pub mod messages;
pub mod pipeline;
pub mod tokens;
pub mod trim;

pub use error::{MemoryError, Result};
pub use history::{MessageLog, Session, SessionStore};
pub use llm::{ChatConfig, ChatModel, ChatRequest, ChatResponse, UsageMetadata};
pub use messages::{
    convert_to_messages, filter_by_role, get_buffer_string, Message, MessageRole,
};
pub use pipeline::{
    stage, FnStage, HistoryPipeline, HistoryPipelineBuilder, ModelStage, Pipeline,
    PipelineBuilder, PipelineContext, PromptStage, Stage, TrimStage,
};
pub use tokens::{ApproximateCounter, TiktokenCounter, TokenCounter, MESSAGE_OVERHEAD_TOKENS};
pub use trim::{trim_messages, StartOn, TrimConfig, TrimStrategy, Trimmer, DEFAULT_MAX_TOKENS};
