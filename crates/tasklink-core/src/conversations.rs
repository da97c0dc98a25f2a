//! Conversations and messages: listing, loading, sending, read receipts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tasklink_shared::conversation::{
    sort_messages, validate_content, Conversation, ConversationSummary, Message,
};
use tasklink_shared::types::{ConversationId, MessageId, UserId};
use tasklink_shared::{Result, TasklinkError};
use tracing::{debug, info};

use crate::config::CoreConfig;
use crate::lookup::bounded;
use crate::ports::ConversationStore;

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    timeout: Duration,
    message_window: u32,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>, config: &CoreConfig) -> Self {
        Self {
            store,
            timeout: config.lookup_timeout,
            message_window: config.message_window,
        }
    }

    /// Conversations of `user`, most recent activity first.
    pub async fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        let mut summaries = bounded(
            self.timeout,
            "list conversations",
            self.store.list_summaries(user),
        )
        .await?;
        summaries.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then(b.conversation_id.cmp(&a.conversation_id))
        });
        Ok(summaries)
    }

    /// Authoritative snapshot of the latest message window, oldest first.
    pub async fn load_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let mut messages = bounded(
            self.timeout,
            "load messages",
            self.store.recent_messages(conversation_id, self.message_window),
        )
        .await?;
        sort_messages(&mut messages);
        Ok(messages)
    }

    /// [`load_messages`](Self::load_messages) restricted to participants.
    pub async fn load_messages_as(
        &self,
        viewer: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>> {
        let conversation = self.conversation(conversation_id).await?;
        if !conversation.has_participant(viewer) {
            return Err(TasklinkError::Forbidden(format!(
                "user {viewer} is not a participant of conversation {conversation_id}"
            )));
        }
        self.load_messages(conversation_id).await
    }

    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        content: &str,
    ) -> Result<Message> {
        validate_content(content)?;
        let conversation = self.conversation(conversation_id).await?;
        if !conversation.has_participant(sender) {
            return Err(TasklinkError::Forbidden(format!(
                "user {sender} is not a participant of conversation {conversation_id}"
            )));
        }
        self.append(&conversation, sender, content).await
    }

    /// Send to `recipient`, creating the pair's conversation on first use.
    pub async fn send_direct_message(
        &self,
        sender: UserId,
        recipient: UserId,
        content: &str,
    ) -> Result<Message> {
        if sender == recipient {
            return Err(TasklinkError::Validation(
                "cannot send a message to yourself".into(),
            ));
        }
        validate_content(content)?;
        let conversation = bounded(
            self.timeout,
            "open conversation",
            self.store
                .get_or_create_conversation(sender, recipient, Utc::now()),
        )
        .await?;
        self.append(&conversation, sender, content).await
    }

    /// Mark a message read on behalf of the non-sending participant.
    ///
    /// Returns `true` if this call set `read_at`; marking an already read
    /// message is a no-op returning `false`.
    pub async fn mark_read(&self, message_id: MessageId, acting: UserId) -> Result<bool> {
        let message = bounded(
            self.timeout,
            "message lookup",
            self.store.get_message(message_id),
        )
        .await
        .map_err(|e| match e {
            TasklinkError::NotFound(_) => TasklinkError::NotFound(format!("message {message_id}")),
            other => other,
        })?;

        if message.sender_id == acting {
            return Err(TasklinkError::Forbidden(
                "a sender cannot mark their own message read".into(),
            ));
        }
        let conversation = self.conversation(message.conversation_id).await?;
        if !conversation.has_participant(acting) {
            return Err(TasklinkError::Forbidden(format!(
                "user {acting} is not a participant of conversation {}",
                conversation.id
            )));
        }

        if message.is_read() {
            debug!(message = %message_id, "Message already read");
            return Ok(false);
        }

        let changed = bounded(
            self.timeout,
            "mark read",
            self.store.mark_read(message_id, Utc::now()),
        )
        .await?;
        if changed {
            debug!(message = %message_id, reader = %acting, "Message marked read");
        }
        Ok(changed)
    }

    async fn append(&self, conversation: &Conversation, sender: UserId, content: &str) -> Result<Message> {
        let message = bounded(
            self.timeout,
            "append message",
            self.store
                .append_message(conversation.id, sender, content, Utc::now()),
        )
        .await?;
        info!(
            msg_id = %message.id,
            conversation = %conversation.id,
            sender = %sender,
            "Message sent"
        );
        Ok(message)
    }

    async fn conversation(&self, id: ConversationId) -> Result<Conversation> {
        bounded(self.timeout, "conversation lookup", self.store.get_conversation(id))
            .await
            .map_err(|e| match e {
                TasklinkError::NotFound(_) => TasklinkError::NotFound(format!("conversation {id}")),
                other => other,
            })
    }
}
