//! Collaborator interfaces consumed by the core services.
//!
//! Implementations must provide read-your-writes consistency for the writing
//! actor and must check transitions against the stored state at commit time.

use chrono::{DateTime, Utc};
use tasklink_shared::conversation::{Conversation, ConversationSummary, Message};
use tasklink_shared::directory::DirectoryProfile;
use tasklink_shared::relationship::{Connection, ConnectionStatus};
use tasklink_shared::types::{ConnectionId, ConversationId, MessageId, UserId};
use tasklink_shared::Result;

/// Authoritative storage for connection records.
#[async_trait::async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert a pending record. `InvalidState` if the pair already has a live
    /// record, `Blocked` if the pair is blocked.
    async fn create_request(
        &self,
        requester: UserId,
        receiver: UserId,
        now: DateTime<Utc>,
    ) -> Result<Connection>;

    /// Block the pair on behalf of `blocker`; returns the blocked record and
    /// whether this call changed anything.
    async fn block_pair(
        &self,
        blocker: UserId,
        target: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Connection, bool)>;

    /// Compare-and-set a status. `Ok(false)` when the stored status is no
    /// longer `expected`.
    async fn transition(
        &self,
        id: ConnectionId,
        expected: ConnectionStatus,
        next: ConnectionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn get_connection(&self, id: ConnectionId) -> Result<Connection>;

    /// The blocked or live record for the pair, if any.
    async fn find_governing(&self, a: UserId, b: UserId) -> Result<Option<Connection>>;

    async fn list_for_user(&self, user: UserId, status: ConnectionStatus) -> Result<Vec<Connection>>;

    async fn latest_rejection(
        &self,
        requester: UserId,
        receiver: UserId,
    ) -> Result<Option<DateTime<Utc>>>;
}

/// Authoritative storage for conversations and messages.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_or_create_conversation(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<Conversation>;

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation>;

    async fn list_summaries(&self, user: UserId) -> Result<Vec<ConversationSummary>>;

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message>;

    /// Latest `limit` messages in `(created_at, id)` ascending order.
    async fn recent_messages(&self, conversation_id: ConversationId, limit: u32) -> Result<Vec<Message>>;

    async fn get_message(&self, id: MessageId) -> Result<Message>;

    /// Set `read_at` if unset; `Ok(false)` when it was already set.
    async fn mark_read(&self, id: MessageId, now: DateTime<Utc>) -> Result<bool>;
}

/// The user directory: public profile lookup by id.
#[async_trait::async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// `Ok(None)` when the user does not exist.
    async fn fetch_public_profile(&self, user_id: UserId) -> Result<Option<DirectoryProfile>>;
}
