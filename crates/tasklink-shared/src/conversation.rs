use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_MESSAGE_CHARS, SUMMARY_PREVIEW_CHARS};
use crate::error::TasklinkError;
use crate::types::{ConversationId, MessageId, UserId};

/// A channel between exactly two participants, stored with
/// `participant1_id < participant2_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participant1_id: UserId,
    pub participant2_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participant1_id == user || self.participant2_id == user
    }

    pub fn other_participant(&self, user: UserId) -> UserId {
        if self.participant1_id == user {
            self.participant2_id
        } else {
            self.participant1_id
        }
    }
}

/// An append-only message. Only `read_at` ever changes, once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Sort messages into display order: `(created_at, id)` ascending.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}

/// Denormalized copy of a conversation's latest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl MessageSummary {
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            preview: preview(&message.content),
            created_at: message.created_at,
            read_at: message.read_at,
        }
    }
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub other_user_id: UserId,
    pub last_message: Option<MessageSummary>,
    pub last_activity_at: DateTime<Utc>,
}

/// Reject blank or oversized content. The content itself is stored as sent.
pub fn validate_content(content: &str) -> Result<(), TasklinkError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(TasklinkError::Validation(
            "message content must not be empty".into(),
        ));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(TasklinkError::Validation(format!(
            "message content exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

fn preview(content: &str) -> String {
    if content.chars().count() <= SUMMARY_PREVIEW_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}
