use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical chat message, independent of any vendor format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a new message with role and text content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation split into its system prompt and its turns.
///
/// Providers that carry the system prompt outside the turn list use this.
/// When several system messages are present the last one wins; earlier ones
/// are dropped rather than concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConversation<'a> {
    pub system: Option<&'a str>,
    pub turns: Vec<&'a ChatMessage>,
}

impl<'a> SplitConversation<'a> {
    pub fn from_messages(messages: &'a [ChatMessage]) -> Self {
        let mut system = None;
        let mut turns = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                Role::System => system = Some(message.content.as_str()),
                Role::User | Role::Assistant => turns.push(message),
            }
        }

        Self { system, turns }
    }
}
