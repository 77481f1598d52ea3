//! Transcript: the append-only message log of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender used for kickoff, progress and termination notices.
pub const SYSTEM_SENDER: &str = "system";
/// Sender used for failure and cancellation notices.
pub const ERROR_SENDER: &str = "error";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    Participant,
    Error,
}

/// One conversational turn. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Position in the transcript, starting at 0 for the kickoff.
    pub sequence: usize,
    pub sender: String,
    pub role: MessageRole,
    /// Mirrors `sender`; the front end keys its styling on this field.
    pub agent_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only sequence of messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns it. Sequence and timestamp are assigned here.
    pub fn append(&mut self, sender: &str, role: MessageRole, content: String) -> &Message {
        let message = Message {
            sequence: self.messages.len(),
            sender: sender.to_string(),
            role,
            agent_type: sender.to_string(),
            content,
            timestamp: Utc::now(),
        };
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
