use chrono::{DateTime, Utc};
use rusqlite::params;
use tasklink_shared::conversation::Message;
use tasklink_shared::types::{ConversationId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::time;

impl Database {
    /// Append a message and refresh the conversation's denormalized summary.
    ///
    /// The summary keeps pointing at the latest message in `(created_at, id)`
    /// order, so a message stamped earlier than the current last one leaves
    /// it untouched.
    pub fn append_message(
        &mut self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let ts = time::to_sql(&now);
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO messages (conversation_id, sender_id, content, created_at, read_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![conversation_id.0, sender_id.0, content, ts],
        )?;
        let id = MessageId(tx.last_insert_rowid());

        // Ids only grow, so an equal timestamp still advances the summary.
        tx.execute(
            "UPDATE conversations SET last_message_id = ?2, last_activity_at = ?3
             WHERE id = ?1 AND (last_message_id IS NULL OR last_activity_at <= ?3)",
            params![conversation_id.0, id.0, ts],
        )?;
        tx.commit()?;

        Ok(Message {
            id,
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: now,
            read_at: None,
        })
    }

    /// The latest `limit` messages of a conversation in `(created_at, id)`
    /// ascending order.
    pub fn list_recent_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_id, content, created_at, read_at
             FROM (
                 SELECT * FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2
             )
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.0, limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, conversation_id, sender_id, content, created_at, read_at
                 FROM messages WHERE id = ?1",
                params![id.0],
                row_to_message,
            )
            .map_err(StoreError::from_query)
    }

    /// Set `read_at` if it is still unset. Returns `true` when this call
    /// performed the update.
    pub fn mark_message_read(&self, id: MessageId, now: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
            params![id.0, time::to_sql(&now)],
        )?;
        Ok(affected == 1)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let created: String = row.get(4)?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        sender_id: UserId(row.get(2)?),
        content: row.get(3)?,
        created_at: time::parse(4, &created)?,
        read_at: time::parse_opt(5, row.get(5)?)?,
    })
}
