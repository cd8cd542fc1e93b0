//! Offline chat model

use async_trait::async_trait;
use memory_core::{ChatModel, ChatRequest, ChatResponse, Message, MessageRole, Result, UsageMetadata};

/// Repeats the latest human message and reports the window it was given
///
/// Needs no credentials, which makes it useful for trying out trimming
/// settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoModel;

#[async_trait]
impl ChatModel for EchoModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let last_human = request
            .messages
            .iter()
            .rev()
            .find(|m| m.is(MessageRole::Human))
            .map(|m| m.content())
            .unwrap_or("");

        let reply = format!(
            "You said: {} (window: {} messages)",
            last_human,
            request.messages.len()
        );
        let usage = UsageMetadata::new(request.messages.len(), 1);
        Ok(ChatResponse::new(Message::ai(reply)).with_usage(usage))
    }
}
