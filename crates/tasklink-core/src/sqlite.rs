//! [`ports`](crate::ports) implementations over the SQLite store.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tasklink_shared::conversation::{Conversation, ConversationSummary, Message};
use tasklink_shared::directory::DirectoryProfile;
use tasklink_shared::relationship::{Connection, ConnectionStatus};
use tasklink_shared::types::{ConnectionId, ConversationId, MessageId, UserId};
use tasklink_shared::{Result, TasklinkError};
use tasklink_store::{Database, StoreError};

use crate::ports::{ConnectionStore, ConversationStore, ProfileDirectory};

/// Shared handle to one SQLite database, usable as every core port.
#[derive(Clone)]
pub struct SqliteBackend {
    db: Arc<Mutex<Database>>,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Database::open_in_memory()
            .map(Self::new)
            .map_err(map_store_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| TasklinkError::Unavailable(format!("Lock poisoned: {e}")))
    }

    /// Run `f` against the database, translating store errors.
    pub fn with_db<T>(
        &self,
        f: impl FnOnce(&mut Database) -> tasklink_store::Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock()?;
        f(&mut *guard).map_err(map_store_error)
    }
}

fn map_store_error(e: StoreError) -> TasklinkError {
    match e {
        StoreError::NotFound => TasklinkError::NotFound("record not found".into()),
        StoreError::Conflict(msg) => TasklinkError::InvalidState(msg),
        StoreError::PairBlocked => TasklinkError::Blocked,
        other => {
            tracing::error!(error = %other, "store failure");
            TasklinkError::Unavailable(other.to_string())
        }
    }
}

#[async_trait::async_trait]
impl ConnectionStore for SqliteBackend {
    async fn create_request(
        &self,
        requester: UserId,
        receiver: UserId,
        now: DateTime<Utc>,
    ) -> Result<Connection> {
        self.with_db(|db| db.create_request(requester, receiver, now))
    }

    async fn block_pair(
        &self,
        blocker: UserId,
        target: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Connection, bool)> {
        self.with_db(|db| db.block_pair(blocker, target, now))
    }

    async fn transition(
        &self,
        id: ConnectionId,
        expected: ConnectionStatus,
        next: ConnectionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_db(|db| db.transition_connection(id, expected, next, now))
    }

    async fn get_connection(&self, id: ConnectionId) -> Result<Connection> {
        self.with_db(|db| db.get_connection(id))
    }

    async fn find_governing(&self, a: UserId, b: UserId) -> Result<Option<Connection>> {
        self.with_db(|db| db.find_governing_connection(a, b))
    }

    async fn list_for_user(&self, user: UserId, status: ConnectionStatus) -> Result<Vec<Connection>> {
        self.with_db(|db| db.list_connections_for_user(user, status))
    }

    async fn latest_rejection(
        &self,
        requester: UserId,
        receiver: UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_db(|db| db.latest_rejection(requester, receiver))
    }
}

#[async_trait::async_trait]
impl ConversationStore for SqliteBackend {
    async fn get_or_create_conversation(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<Conversation> {
        self.with_db(|db| db.get_or_create_conversation(a, b, now))
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.with_db(|db| db.get_conversation(id))
    }

    async fn list_summaries(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        self.with_db(|db| db.list_conversation_summaries(user))
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        self.with_db(|db| db.append_message(conversation_id, sender_id, content, now))
    }

    async fn recent_messages(&self, conversation_id: ConversationId, limit: u32) -> Result<Vec<Message>> {
        self.with_db(|db| db.list_recent_messages(conversation_id, limit))
    }

    async fn get_message(&self, id: MessageId) -> Result<Message> {
        self.with_db(|db| db.get_message(id))
    }

    async fn mark_read(&self, id: MessageId, now: DateTime<Utc>) -> Result<bool> {
        self.with_db(|db| db.mark_message_read(id, now))
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for SqliteBackend {
    async fn fetch_public_profile(&self, user_id: UserId) -> Result<Option<DirectoryProfile>> {
        self.with_db(|db| db.get_profile(user_id))
    }
}
