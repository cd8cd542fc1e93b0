//! Chat model capability.
//!
//! The memory core does not talk to any model provider itself. It calls a
//! [`ChatModel`], an injected capability that maps an ordered message sequence
//! to a reply. Provider crates implement the trait; tests use scripted doubles.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use memory_core::llm::{ChatModel, ChatRequest, ChatResponse};
//! use async_trait::async_trait;
//!
//! struct MyClient { /* ... */ }
//!
//! #[async_trait]
//! impl ChatModel for MyClient {
//!     async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
//!         // Convert messages, call the provider, convert the reply back
//!         todo!()
//!     }
//! }
//!
//! let model: Arc<dyn ChatModel> = Arc::new(MyClient { /* ... */ });
//! let response = model.chat(ChatRequest::new(window).with_temperature(0.7)).await?;
//! println!("{}", response.message.content());
//! ```

pub mod config;
pub mod response;
pub mod traits;

pub use config::{ChatConfig, ChatRequest};
pub use response::{ChatResponse, UsageMetadata};
pub use traits::ChatModel;
