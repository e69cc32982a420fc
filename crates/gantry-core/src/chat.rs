use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One element of a structured message body. File parts reference a knowledge
/// base document by its filename; the document itself stays in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    File { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

impl MessageContent {
    pub fn file_names(&self) -> Vec<&str> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::File { name } => Some(name.as_str()),
                    MessagePart::Text { .. } => None,
                })
                .collect(),
        }
    }

    pub fn references_file(&self, file_name: &str) -> bool {
        self.file_names().iter().any(|name| *name == file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
            timestamp: Utc::now(),
        }
    }

    /// A user turn carrying a file attachment ahead of the typed text.
    pub fn user_with_file(content: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(vec![
                MessagePart::File {
                    name: file_name.into(),
                },
                MessagePart::Text {
                    text: content.into(),
                },
            ]),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ChatSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            created: now,
            updated: now,
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
