//! Pipeline bound to per-session message history

use super::{ModelStage, Pipeline, PipelineContext, PromptStage, TrimStage};
use crate::error::{MemoryError, Result};
use crate::history::SessionStore;
use crate::llm::{ChatConfig, ChatModel};
use crate::messages::Message;
use crate::tokens::TokenCounter;
use crate::trim::{TrimConfig, Trimmer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs a [`Pipeline`] against a session's history and records the exchange
///
/// Each [`invoke`](Self::invoke) holds the session lock from the input append
/// through the reply append, so calls on one session never interleave while
/// calls on different sessions run in parallel.
///
/// If the call fails (or its future is dropped) after the input was appended,
/// the input stays in the log and no reply is recorded.
#[derive(Debug, Clone)]
pub struct HistoryPipeline {
    store: Arc<SessionStore>,
    pipeline: Pipeline,
}

impl HistoryPipeline {
    /// Start building the standard trim → prompt → model pipeline
    pub fn builder(
        model: Arc<dyn ChatModel>,
        counter: Arc<dyn TokenCounter>,
    ) -> HistoryPipelineBuilder {
        HistoryPipelineBuilder::new(model, counter)
    }

    /// Bind a custom pipeline to a store
    ///
    /// The pipeline must set `reply`, or `invoke` fails with
    /// [`MemoryError::MissingReply`].
    pub fn new(store: Arc<SessionStore>, pipeline: Pipeline) -> Self {
        Self { store, pipeline }
    }

    /// Send `input` in `session_id` and return the model's reply
    pub async fn invoke(&self, session_id: &str, input: Message) -> Result<Message> {
        let session = self.store.get_or_create(session_id);
        let mut log = session.lock().await;

        log.append(input);
        let ctx = PipelineContext::new(session_id, log.snapshot());

        let ctx = match self.pipeline.invoke(ctx).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Invocation failed, no reply recorded");
                return Err(e);
            }
        };

        let reply = ctx.reply.ok_or_else(|| MemoryError::MissingReply {
            session_id: session_id.to_string(),
        })?;

        log.append(reply.clone());
        debug!(session_id = %session_id, history = log.len(), "Recorded reply");

        Ok(reply)
    }

    /// Full, untrimmed history of `session_id`
    ///
    /// Unknown sessions yield an empty history and are not created.
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        match self.store.get(session_id) {
            Some(session) => session.snapshot().await,
            None => Vec::new(),
        }
    }

    /// The backing session store
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The composed pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Builder for [`HistoryPipeline`]
pub struct HistoryPipelineBuilder {
    model: Arc<dyn ChatModel>,
    counter: Arc<dyn TokenCounter>,
    trim_config: TrimConfig,
    system_prompt: Option<String>,
    chat_config: ChatConfig,
    timeout: Option<Duration>,
    store: Option<Arc<SessionStore>>,
}

impl HistoryPipelineBuilder {
    fn new(model: Arc<dyn ChatModel>, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            model,
            counter,
            trim_config: TrimConfig::default(),
            system_prompt: None,
            chat_config: ChatConfig::default(),
            timeout: None,
            store: None,
        }
    }

    /// Trimming parameters (default: [`TrimConfig::default`])
    pub fn trim_config(mut self, config: TrimConfig) -> Self {
        self.trim_config = config;
        self
    }

    /// System instructions placed in front of every trimmed window
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Generation settings passed to the model
    pub fn chat_config(mut self, config: ChatConfig) -> Self {
        self.chat_config = config;
        self
    }

    /// Deadline for each model call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Share an existing store instead of creating a fresh one
    pub fn store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and assemble the pipeline
    pub fn build(self) -> Result<HistoryPipeline> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(MemoryError::configuration("timeout must be greater than zero"));
        }

        let trimmer = Trimmer::new(self.trim_config, self.counter)?;

        let mut model_stage = ModelStage::new(self.model).with_config(self.chat_config);
        if let Some(timeout) = self.timeout {
            model_stage = model_stage.with_timeout(timeout);
        }

        let mut builder = Pipeline::builder().then(TrimStage::new(trimmer));
        if let Some(prompt) = self.system_prompt {
            builder = builder.then(PromptStage::new(prompt));
        }
        let pipeline = builder.then(model_stage).build()?;

        Ok(HistoryPipeline {
            store: self.store.unwrap_or_default(),
            pipeline,
        })
    }
}
