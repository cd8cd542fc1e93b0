//! Token-budgeted trimming of conversation history
//!
//! Trimming picks the part of a session's history that is sent to the model on
//! the next call. It never mutates the history: the result is a new vector
//! built from the input.
//!
//! # Algorithm
//!
//! 1. With `include_system`, a leading system message is reserved. It is kept
//!    as the first output element and its cost comes off the budget. If the
//!    system message alone is over budget, nothing fits and the output is
//!    empty.
//! 2. The remaining messages are scanned newest to oldest, adding costs, and
//!    the scan stops at the first message that would overflow the budget. What
//!    survives is the longest trailing run that fits.
//! 3. Messages are kept whole or not at all.
//! 4. Leading messages of that run are dropped until one has the `start_on`
//!    role, so a window never opens on a reply whose question was evicted.
//!
//! # Example
//!
//! ```rust
//! use memory_core::messages::Message;
//! use memory_core::tokens::ApproximateCounter;
//! use memory_core::trim::{trim_messages, StartOn, TrimConfig};
//!
//! # tokio_test_block(async {
//! let messages = vec![
//!     Message::system("You are a good assistant"),
//!     Message::human("Hi! My name is Bob"),
//!     Message::ai("Hi Bob! How can I help?"),
//!     Message::human("I like vanilla ice cream"),
//! ];
//!
//! let config = TrimConfig::new(20).with_start_on(StartOn::Human);
//! let window = trim_messages(&messages, &config, &ApproximateCounter::default())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(window.first().unwrap().content(), "You are a good assistant");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use crate::error::{MemoryError, Result};
use crate::messages::{Message, MessageRole};
use crate::tokens::TokenCounter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Which end of the history survives trimming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimStrategy {
    /// Keep the most recent messages
    #[default]
    Last,
}

/// Role the trimmed window has to start on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOn {
    /// First kept message must be a human message
    #[default]
    Human,
    /// First kept message must be an AI reply
    Ai,
    /// First kept message must be a system message
    System,
    /// No constraint
    Any,
}

impl StartOn {
    /// Required role, or `None` for [`StartOn::Any`]
    pub fn role(&self) -> Option<MessageRole> {
        match self {
            StartOn::Human => Some(MessageRole::Human),
            StartOn::Ai => Some(MessageRole::Ai),
            StartOn::System => Some(MessageRole::System),
            StartOn::Any => None,
        }
    }
}

impl FromStr for StartOn {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("any") {
            return Ok(StartOn::Any);
        }
        let role: MessageRole = s.parse().map_err(|_| {
            MemoryError::configuration(format!(
                "start_on must be one of human, ai, system, any (got '{}')",
                s
            ))
        })?;
        Ok(match role {
            MessageRole::Human => StartOn::Human,
            MessageRole::Ai => StartOn::Ai,
            MessageRole::System => StartOn::System,
        })
    }
}

/// Options for trimming messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Token budget for the whole window
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Which messages survive
    #[serde(default)]
    pub strategy: TrimStrategy,

    /// Reserve a leading system message
    #[serde(default = "default_include_system")]
    pub include_system: bool,

    /// Allow cutting a message to fit. Not supported; must stay `false`.
    #[serde(default)]
    pub allow_partial: bool,

    /// Role the non-system part of the window starts on
    #[serde(default)]
    pub start_on: StartOn,
}

/// Budget used when none is configured
pub const DEFAULT_MAX_TOKENS: usize = 45;

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_include_system() -> bool {
    true
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            strategy: TrimStrategy::Last,
            include_system: true,
            allow_partial: false,
            start_on: StartOn::Human,
        }
    }
}

impl TrimConfig {
    /// Keep the most recent messages that fit in `max_tokens`
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    /// Set whether a leading system message is reserved
    pub fn with_include_system(mut self, include: bool) -> Self {
        self.include_system = include;
        self
    }

    /// Set whether messages may be cut to fit
    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Set the role the window starts on
    pub fn with_start_on(mut self, start_on: StartOn) -> Self {
        self.start_on = start_on;
        self
    }

    /// Reject unsupported combinations
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(MemoryError::configuration(
                "max_tokens must be greater than zero",
            ));
        }
        if self.allow_partial {
            return Err(MemoryError::configuration(
                "allow_partial is not supported; messages are only kept whole",
            ));
        }
        Ok(())
    }
}

/// Trim messages to a token budget
///
/// Calls `counter` once for the reserved system message (if any) and once per
/// candidate examined. Counter failures abort the trim.
pub async fn trim_messages(
    messages: &[Message],
    config: &TrimConfig,
    counter: &dyn TokenCounter,
) -> Result<Vec<Message>> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let (reserved, candidates) = match messages.split_first() {
        Some((first, rest)) if config.include_system && first.is(MessageRole::System) => {
            (Some(first), rest)
        }
        _ => (None, messages),
    };

    let mut budget = config.max_tokens;
    if let Some(system) = reserved {
        let cost = counter.count_message(system).await?;
        if cost > budget {
            debug!(
                system_tokens = cost,
                max_tokens = config.max_tokens,
                "System message exceeds token budget, window is empty"
            );
            return Ok(Vec::new());
        }
        budget -= cost;
    }

    let start = match config.strategy {
        TrimStrategy::Last => last_fitting_start(candidates, budget, counter).await?,
    };
    let mut window = &candidates[start..];

    if let Some(role) = config.start_on.role() {
        let skip = window
            .iter()
            .position(|m| m.is(role))
            .unwrap_or(window.len());
        window = &window[skip..];
    }

    let mut result = Vec::with_capacity(window.len() + 1);
    result.extend(reserved.cloned());
    result.extend_from_slice(window);

    debug!(
        input = messages.len(),
        kept = result.len(),
        budget = config.max_tokens,
        "Trimmed messages"
    );

    Ok(result)
}

/// Index where the longest trailing run fitting `budget` begins
async fn last_fitting_start(
    candidates: &[Message],
    budget: usize,
    counter: &dyn TokenCounter,
) -> Result<usize> {
    let mut used = 0usize;
    let mut start = candidates.len();

    for (idx, message) in candidates.iter().enumerate().rev() {
        let cost = counter.count_message(message).await?;
        match used.checked_add(cost) {
            Some(total) if total <= budget => {
                used = total;
                start = idx;
            }
            _ => break,
        }
    }

    Ok(start)
}

/// A trim configuration bound to a token counter
///
/// ```rust,ignore
/// let trimmer = Trimmer::new(TrimConfig::new(45), Arc::new(TiktokenCounter::new()?))?;
/// let window = trimmer.apply(&history).await?;
/// ```
#[derive(Clone)]
pub struct Trimmer {
    config: TrimConfig,
    counter: Arc<dyn TokenCounter>,
}

impl Trimmer {
    /// Validate `config` and bind it to `counter`
    pub fn new(config: TrimConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, counter })
    }

    /// Trim `messages` with the bound configuration
    pub async fn apply(&self, messages: &[Message]) -> Result<Vec<Message>> {
        trim_messages(messages, &self.config, self.counter.as_ref()).await
    }

    /// The bound configuration
    pub fn config(&self) -> &TrimConfig {
        &self.config
    }
}

impl std::fmt::Debug for Trimmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trimmer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
