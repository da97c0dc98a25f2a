//! Conversations between two participants.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tasklink_shared::conversation::{Conversation, ConversationSummary, MessageSummary};
use tasklink_shared::types::{ordered_pair, ConversationId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::time;

impl Database {
    /// Return the pair's conversation, creating it on first use.
    pub fn get_or_create_conversation(
        &self,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<Conversation> {
        let (low, high) = ordered_pair(a, b);
        if low == high {
            return Err(StoreError::Conflict(
                "a conversation needs two distinct participants".into(),
            ));
        }
        let ts = time::to_sql(&now);
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO conversations
                (participant1_id, participant2_id, created_at, last_message_id, last_activity_at)
             VALUES (?1, ?2, ?3, NULL, ?3)",
            params![low.0, high.0, ts],
        )?;
        if inserted == 1 {
            tracing::debug!(%low, %high, "created conversation");
        }

        self.find_conversation_between(low, high)?
            .ok_or(StoreError::NotFound)
    }

    pub fn find_conversation_between(&self, a: UserId, b: UserId) -> Result<Option<Conversation>> {
        let (low, high) = ordered_pair(a, b);
        Ok(self
            .conn()
            .query_row(
                "SELECT id, participant1_id, participant2_id, created_at
                 FROM conversations
                 WHERE participant1_id = ?1 AND participant2_id = ?2",
                params![low.0, high.0],
                row_to_conversation,
            )
            .optional()?)
    }

    pub fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.conn()
            .query_row(
                "SELECT id, participant1_id, participant2_id, created_at
                 FROM conversations WHERE id = ?1",
                params![id.0],
                row_to_conversation,
            )
            .map_err(StoreError::from_query)
    }

    /// Conversations involving `user`, most recent activity first, each with
    /// its latest message.
    pub fn list_conversation_summaries(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.participant1_id, c.participant2_id, c.last_activity_at,
                    m.id, m.sender_id, m.content, m.created_at, m.read_at
             FROM conversations c
             LEFT JOIN messages m ON m.id = c.last_message_id
             WHERE c.participant1_id = ?1 OR c.participant2_id = ?1
             ORDER BY c.last_activity_at DESC, c.id DESC",
        )?;

        let rows = stmt.query_map(params![user.0], |row| {
            let p1 = UserId(row.get(1)?);
            let p2 = UserId(row.get(2)?);
            let activity: String = row.get(3)?;

            let last_message = match row.get::<_, Option<i64>>(4)? {
                Some(message_id) => {
                    let content: String = row.get(6)?;
                    let created: String = row.get(7)?;
                    let message = tasklink_shared::conversation::Message {
                        id: MessageId(message_id),
                        conversation_id: ConversationId(row.get(0)?),
                        sender_id: UserId(row.get(5)?),
                        content,
                        created_at: time::parse(7, &created)?,
                        read_at: time::parse_opt(8, row.get(8)?)?,
                    };
                    Some(MessageSummary::from_message(&message))
                }
                None => None,
            };

            Ok(ConversationSummary {
                conversation_id: ConversationId(row.get(0)?),
                other_user_id: if p1 == user { p2 } else { p1 },
                last_message,
                last_activity_at: time::parse(3, &activity)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let created: String = row.get(3)?;
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        participant1_id: UserId(row.get(1)?),
        participant2_id: UserId(row.get(2)?),
        created_at: time::parse(3, &created)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_conversation_per_pair() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let a = db.get_or_create_conversation(UserId(2), UserId(1), now).unwrap();
        let b = db.get_or_create_conversation(UserId(1), UserId(2), now).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.participant1_id, UserId(1));
        assert_eq!(a.participant2_id, UserId(2));
    }

    #[test]
    fn self_conversation_is_refused() {
        let db = Database::open_in_memory().unwrap();
        assert!(db
            .get_or_create_conversation(UserId(3), UserId(3), Utc::now())
            .is_err());
    }

    #[test]
    fn empty_conversation_lists_without_summary() {
        let db = Database::open_in_memory().unwrap();
        db.get_or_create_conversation(UserId(1), UserId(2), Utc::now())
            .unwrap();
        let list = db.list_conversation_summaries(UserId(2)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].other_user_id, UserId(1));
        assert!(list[0].last_message.is_none());
    }
}
