//! Groq client implementation.
//!
//! Groq serves open models (Gemma, Llama, Mixtral) behind an OpenAI-compatible
//! chat completions API.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::GroqClient;
//! use llm::config::RemoteLlmConfig;
//! use memory_core::{ChatModel, ChatRequest, Message};
//!
//! let config = RemoteLlmConfig::groq_from_env("gemma2-9b-it")?;
//! let client = GroqClient::new(config)?;
//!
//! let request = ChatRequest::new(vec![Message::human("Hello!")]);
//! let response = client.chat(request).await?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result as LlmResult};
use async_trait::async_trait;
use memory_core::llm::{ChatModel, ChatRequest, ChatResponse, UsageMetadata};
use memory_core::{Message, MessageRole, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff before retry number `attempt + 1`, capped.
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Groq API client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl GroqClient {
    /// Create a new Groq client with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> LlmResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Model this client sends requests to.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Convert a message to Groq's wire format.
    fn convert_message(&self, msg: &Message) -> GroqMessage {
        GroqMessage {
            role: match msg.role() {
                MessageRole::System => "system".to_string(),
                MessageRole::Human => "user".to_string(),
                MessageRole::Ai => "assistant".to_string(),
            },
            content: msg.content().to_string(),
        }
    }

    fn build_request(&self, request: &ChatRequest) -> GroqRequest {
        GroqRequest {
            model: self.config.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| self.convert_message(m))
                .collect(),
            temperature: request.config.temperature,
            max_tokens: request.config.max_tokens,
            stop: if request.config.stop_sequences.is_empty() {
                None
            } else {
                Some(request.config.stop_sequences.clone())
            },
            stream: false,
        }
    }

    /// Convert a Groq response to a ChatResponse.
    fn convert_response(&self, groq_resp: GroqResponse) -> LlmResult<ChatResponse> {
        let choice = groq_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let mut response = ChatResponse::new(Message::ai(choice.message.content))
            .with_metadata("model", serde_json::Value::String(groq_resp.model))
            .with_metadata(
                "finish_reason",
                serde_json::Value::String(choice.finish_reason.unwrap_or_default()),
            );

        if let Some(id) = groq_resp.id {
            response = response.with_metadata("id", serde_json::Value::String(id));
        }
        if let Some(usage) = groq_resp.usage {
            response = response.with_usage(UsageMetadata::new(
                usage.prompt_tokens,
                usage.completion_tokens,
            ));
        }

        Ok(response)
    }

    async fn send_once(&self, body: &GroqRequest) -> LlmResult<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text));
        }

        let text = response.text().await?;
        let groq_resp: GroqResponse = serde_json::from_str(&text)?;

        self.convert_response(groq_resp)
    }

    async fn send_with_retries(&self, body: &GroqRequest) -> LlmResult<ChatResponse> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(body).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        model = %self.config.model,
                        attempt = attempt + 1,
                        ?delay,
                        error = %e,
                        "Groq request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Map a non-2xx status to an error.
fn status_error(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED => LlmError::AuthenticationError(body),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded(body),
        _ => LlmError::ProviderError(format!("Groq API error {}: {}", status, body)),
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request(&request);
        debug!(
            model = %self.config.model,
            messages = body.messages.len(),
            "Sending chat completion"
        );

        let response = self.send_with_retries(&body).await?;

        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Chat completion finished"
            );
        }
        Ok(response)
    }

    async fn is_available(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                Err(LlmError::AuthenticationError("API key rejected".to_string()).into())
            }
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                debug!(error = %e, "Groq unreachable");
                Ok(false)
            }
        }
    }
}

// Groq API types (OpenAI-compatible)
#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: String,
    choices: Vec<GroqChoice>,
    #[serde(default)]
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
