use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_address: String,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(id: String, user_address: &str) -> Self {
        Self {
            id,
            user_address: user_address.to_string(),
            messages: Vec::new(),
        }
    }

    /// Appends a message, dropping the oldest ones beyond `max_messages`.
    pub fn push(&mut self, role: ChatRole, content: impl Into<String>, max_messages: usize) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        if self.messages.len() > max_messages {
            let overflow = self.messages.len() - max_messages;
            self.messages.drain(..overflow);
        }
    }

    pub fn recent(&self, window: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }
}
