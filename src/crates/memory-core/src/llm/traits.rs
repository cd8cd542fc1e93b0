//! The [`ChatModel`] trait.

use crate::error::Result;
use crate::llm::config::ChatRequest;
use crate::llm::response::ChatResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// A language model that answers an ordered message sequence with one reply.
///
/// # Errors
///
/// Implementations return [`MemoryError::Model`](crate::MemoryError::Model)
/// for transport, quota, authentication, and provider failures. The history
/// pipeline passes these to its caller unchanged and records no reply.
///
/// # Threading and Safety
///
/// Implementations must be `Send + Sync`; share them as `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete reply for the request's messages.
    ///
    /// May block for a long time. Callers that need a deadline wrap the call
    /// (see [`ModelStage::with_timeout`](crate::pipeline::ModelStage::with_timeout)).
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Check whether the provider is reachable.
    ///
    /// Default implementation returns `Ok(true)`.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        (**self).chat(request).await
    }

    async fn is_available(&self) -> Result<bool> {
        (**self).is_available().await
    }
}
