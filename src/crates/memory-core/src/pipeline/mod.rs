//! Stage-based composition of a model call
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage takes a
//! [`PipelineContext`] and returns a new one; the pipeline threads the
//! context through the stages in order and stops at the first error.
//!
//! The built-in stages cover the usual chat chain:
//!
//! ```text
//!  messages ──► TrimStage ──► PromptStage ──► ModelStage ──► reply
//!               messages ←    messages ←      reply ←
//!               trim(messages) system + msgs  model(messages)
//! ```
//!
//! [`TrimStage`] is a field assignment: it rewrites `messages` from
//! `messages` and leaves every other field alone.
//!
//! [`HistoryPipeline`] wraps a pipeline with session storage: it feeds the
//! pipeline the session's history and records the reply.
//!
//! # Example
//!
//! ```rust,ignore
//! use memory_core::pipeline::{stage, ModelStage, Pipeline, PipelineContext, TrimStage};
//!
//! let pipeline = Pipeline::builder()
//!     .then(TrimStage::new(trimmer))
//!     .then(stage("log", |ctx| Box::pin(async move {
//!         tracing::info!(messages = ctx.messages.len(), "Sending window");
//!         Ok(ctx)
//!     })))
//!     .then(ModelStage::new(model))
//!     .build()?;
//!
//! let ctx = pipeline.invoke(PipelineContext::new("chat1", history)).await?;
//! println!("{}", ctx.reply.unwrap().content());
//! ```

use crate::error::{MemoryError, Result};
use crate::llm::{ChatConfig, ChatModel, ChatRequest, UsageMetadata};
use crate::messages::{Message, MessageRole};
use crate::trim::Trimmer;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

mod with_history;

pub use with_history::{HistoryPipeline, HistoryPipelineBuilder};

/// Structured state passed between stages
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    /// Session the call belongs to
    pub session_id: String,

    /// Messages that will be sent to the model
    pub messages: Vec<Message>,

    /// Model reply, once a model stage has run
    pub reply: Option<Message>,

    /// Token usage reported with the reply
    pub usage: Option<UsageMetadata>,
}

impl PipelineContext {
    /// Start a context from a session's history
    pub fn new(session_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            session_id: session_id.into(),
            messages,
            reply: None,
            usage: None,
        }
    }
}

/// One step of a pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Transform the context
    async fn run(&self, ctx: PipelineContext) -> Result<PipelineContext>;
}

/// Boxed async function usable as a stage
pub type StageFn = Arc<
    dyn Fn(PipelineContext) -> Pin<Box<dyn Future<Output = Result<PipelineContext>> + Send>>
        + Send
        + Sync,
>;

/// A stage built from a closure
#[derive(Clone)]
pub struct FnStage {
    name: String,
    executor: StageFn,
}

impl FnStage {
    /// Create a stage from a name and an async closure
    pub fn new<F>(name: impl Into<String>, executor: F) -> Self
    where
        F: Fn(PipelineContext) -> Pin<Box<dyn Future<Output = Result<PipelineContext>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            executor: Arc::new(executor),
        }
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        (self.executor)(ctx).await
    }
}

/// Convenience function to create a closure stage
///
/// ```rust
/// use memory_core::pipeline::stage;
///
/// let passthrough = stage("passthrough", |ctx| Box::pin(async move { Ok(ctx) }));
/// ```
pub fn stage<F>(name: impl Into<String>, executor: F) -> FnStage
where
    F: Fn(PipelineContext) -> Pin<Box<dyn Future<Output = Result<PipelineContext>> + Send>>
        + Send
        + Sync
        + 'static,
{
    FnStage::new(name, executor)
}

/// Replaces `messages` with its trimmed window
#[derive(Debug, Clone)]
pub struct TrimStage {
    trimmer: Trimmer,
}

impl TrimStage {
    /// Trim with a validated trimmer
    pub fn new(trimmer: Trimmer) -> Self {
        Self { trimmer }
    }
}

#[async_trait]
impl Stage for TrimStage {
    fn name(&self) -> &str {
        "trim"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let before = ctx.messages.len();
        ctx.messages = self.trimmer.apply(&ctx.messages).await?;
        debug!(
            session_id = %ctx.session_id,
            before,
            after = ctx.messages.len(),
            "Trimmed context window"
        );
        Ok(ctx)
    }
}

/// Prompt template: a fixed system message followed by the messages
///
/// The messages are placed unchanged after the template's system message,
/// including any system message the trimmer reserved.
#[derive(Debug, Clone)]
pub struct PromptStage {
    system_prompt: String,
}

impl PromptStage {
    /// Template with the given system instructions
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Render the template around `messages`
    pub fn format(&self, messages: &[Message]) -> Vec<Message> {
        let mut rendered = Vec::with_capacity(messages.len() + 1);
        rendered.push(Message::system(self.system_prompt.clone()));
        rendered.extend_from_slice(messages);
        rendered
    }
}

#[async_trait]
impl Stage for PromptStage {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        ctx.messages = self.format(&ctx.messages);
        Ok(ctx)
    }
}

/// Sends `messages` to the model and stores the reply
#[derive(Clone)]
pub struct ModelStage {
    model: Arc<dyn ChatModel>,
    config: ChatConfig,
    timeout: Option<Duration>,
}

impl ModelStage {
    /// Call `model` with default generation settings and no deadline
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            config: ChatConfig::default(),
            timeout: None,
        }
    }

    /// Use these generation settings for every call
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Fail with [`MemoryError::Timeout`] if the model takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Stage for ModelStage {
    fn name(&self) -> &str {
        "model"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let request = ChatRequest::new(ctx.messages.clone()).with_config(self.config.clone());

        let call = self.model.chat(request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| MemoryError::Timeout(limit))??,
            None => call.await?,
        };

        if !response.message.is(MessageRole::Ai) {
            warn!(
                session_id = %ctx.session_id,
                role = %response.message.role(),
                "Model replied with a non-ai role"
            );
        }

        ctx.reply = Some(response.message);
        ctx.usage = response.usage;
        Ok(ctx)
    }
}

impl std::fmt::Debug for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStage")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn add_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append a stage (alias for `add_stage`)
    pub fn then(self, stage: impl Stage + 'static) -> Self {
        self.add_stage(stage)
    }

    /// Finish the pipeline; it needs at least one stage
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(MemoryError::configuration(
                "Pipeline must have at least one stage",
            ));
        }
        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

/// An ordered list of stages
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run every stage in order
    pub async fn invoke(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        for stage in &self.stages {
            debug!(session_id = %ctx.session_id, stage = stage.name(), "Running stage");
            ctx = stage.run(ctx).await.map_err(|e| {
                warn!(stage = stage.name(), error = %e, "Stage failed");
                e
            })?;
        }
        Ok(ctx)
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
