//! Message types for conversational memory
//!
//! A [`Message`] is one utterance in a session: a [`MessageRole`] and the text
//! content. Messages are immutable once built. Logs hand out clones, so nothing
//! a caller does with a snapshot can change stored history.
//!
//! # Core Types
//!
//! ```rust
//! use memory_core::messages::{Message, MessageRole};
//!
//! let system = Message::system("You are a helpful assistant.");
//! let question = Message::human("Hi, I'm Bob");
//! let answer = Message::ai("Hi Bob!");
//!
//! assert_eq!(system.role(), MessageRole::System);
//! assert_eq!(answer.content(), "Hi Bob!");
//! ```
//!
//! ## Role Shorthand
//!
//! Raw `(role, content)` pairs can be converted in bulk. Roles accept the
//! common provider aliases (`user`, `assistant`):
//!
//! ```rust
//! use memory_core::messages::convert_to_messages;
//!
//! let messages = convert_to_messages(vec![
//!     ("system", "Be concise"),
//!     ("user", "What is Rust?"),
//!     ("assistant", "A systems programming language."),
//! ]).unwrap();
//! assert_eq!(messages.len(), 3);
//! ```
//!
//! # Serialization
//!
//! Messages serialize to JSON objects with lowercase roles:
//!
//! ```json
//! {"id": "5b0c...", "role": "human", "content": "Hi, I'm Bob"}
//! ```

use crate::error::{MemoryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of the message sender in a conversation.
///
/// The set of roles is closed: trimming decisions match on it exhaustively.
///
/// # Serialization
///
/// - `System` → `"system"`
/// - `Human` → `"human"` (also accepts `"user"`)
/// - `Ai` → `"ai"` (also accepts `"assistant"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions or context for the model.
    System,

    /// Input from the end user.
    #[serde(alias = "user")]
    Human,

    /// A reply produced by the model.
    #[serde(alias = "assistant")]
    Ai,
}

impl MessageRole {
    /// Lowercase wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
        }
    }

    /// Speaker label used when rendering a transcript
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::Human => "Human",
            MessageRole::Ai => "AI",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "human" | "user" => Ok(MessageRole::Human),
            "ai" | "assistant" => Ok(MessageRole::Ai),
            other => Err(MemoryError::InvalidMessage(format!(
                "unknown message role '{}'",
                other
            ))),
        }
    }
}

/// A single immutable message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id")]
    id: String,
    role: MessageRole,
    content: String,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Create a new message with the given role and content
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an AI reply message
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, content)
    }

    /// Replace the generated ID. Consumes the message, so it can only be used
    /// while building one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Unique identifier of this message
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Role of the sender
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Text content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether this message was sent with the given role
    pub fn is(&self, role: MessageRole) -> bool {
        self.role == role
    }
}

/// Convert `(role, content)` pairs to messages
///
/// Fails on the first unknown role.
pub fn convert_to_messages<R, C>(values: Vec<(R, C)>) -> Result<Vec<Message>>
where
    R: AsRef<str>,
    C: Into<String>,
{
    values
        .into_iter()
        .map(|(role, content)| Ok(Message::new(role.as_ref().parse()?, content)))
        .collect()
}

/// Filter messages by role
///
/// ```rust
/// use memory_core::messages::{Message, MessageRole, filter_by_role};
///
/// let messages = vec![
///     Message::human("Hello"),
///     Message::ai("Hi there!"),
///     Message::human("How are you?"),
/// ];
///
/// assert_eq!(filter_by_role(&messages, MessageRole::Human).len(), 2);
/// ```
pub fn filter_by_role(messages: &[Message], role: MessageRole) -> Vec<Message> {
    messages.iter().filter(|m| m.role == role).cloned().collect()
}

/// Render messages as a plain transcript, one `Label: content` line each
///
/// ```rust
/// use memory_core::messages::{Message, get_buffer_string};
///
/// let transcript = get_buffer_string(&[Message::human("hi"), Message::ai("hello")]);
/// assert_eq!(transcript, "Human: hi\nAI: hello");
/// ```
pub fn get_buffer_string(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
