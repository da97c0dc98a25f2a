//! v002 -- Conversations and messages.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    participant1_id  INTEGER NOT NULL,
    participant2_id  INTEGER NOT NULL,
    created_at       TEXT NOT NULL,
    last_message_id  INTEGER,                -- denormalized latest message
    last_activity_at TEXT NOT NULL,

    CHECK (participant1_id < participant2_id),
    UNIQUE (participant1_id, participant2_id)
);

CREATE INDEX IF NOT EXISTS idx_conversations_p1 ON conversations(participant1_id, last_activity_at DESC);
CREATE INDEX IF NOT EXISTS idx_conversations_p2 ON conversations(participant2_id, last_activity_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL,
    sender_id       INTEGER NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    read_at         TEXT,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, created_at, id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
