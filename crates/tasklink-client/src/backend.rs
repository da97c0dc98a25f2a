use tasklink_core::ConversationService;
use tasklink_shared::conversation::{ConversationSummary, Message};
use tasklink_shared::types::{ConversationId, MessageId, UserId};
use tasklink_shared::Result;

/// Where a client reads and writes conversation state.
#[async_trait::async_trait]
pub trait SyncBackend: Send + Sync {
    async fn list_conversations(&self, viewer: UserId) -> Result<Vec<ConversationSummary>>;

    async fn load_messages(&self, viewer: UserId, conversation_id: ConversationId) -> Result<Vec<Message>>;

    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message>;

    async fn mark_read(&self, acting: UserId, message_id: MessageId) -> Result<bool>;
}

#[async_trait::async_trait]
impl SyncBackend for ConversationService {
    async fn list_conversations(&self, viewer: UserId) -> Result<Vec<ConversationSummary>> {
        ConversationService::list_conversations(self, viewer).await
    }

    async fn load_messages(&self, viewer: UserId, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.load_messages_as(viewer, conversation_id).await
    }

    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message> {
        ConversationService::send_message(self, conversation_id, sender, content).await
    }

    async fn mark_read(&self, acting: UserId, message_id: MessageId) -> Result<bool> {
        ConversationService::mark_read(self, message_id, acting).await
    }
}
