//! v001 -- Directory profiles and connection records.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Directory profiles (read-only projection of user accounts)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id    INTEGER PRIMARY KEY NOT NULL,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL,
    avatar_url TEXT,
    location   TEXT,
    skills     TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    updated_at TEXT NOT NULL                 -- RFC-3339
);

-- ----------------------------------------------------------------
-- Connections
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connections (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id INTEGER NOT NULL,
    receiver_id  INTEGER NOT NULL,
    user_low     INTEGER NOT NULL,           -- min(requester, receiver)
    user_high    INTEGER NOT NULL,           -- max(requester, receiver)
    status       TEXT NOT NULL,
    blocked_by   INTEGER,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,

    CHECK (requester_id <> receiver_id),
    CHECK (status IN ('pending', 'accepted', 'rejected', 'blocked', 'removed'))
);

-- At most one live record per unordered pair.
CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_live_pair
    ON connections(user_low, user_high)
    WHERE status IN ('pending', 'accepted');

-- At most one block per unordered pair.
CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_blocked_pair
    ON connections(user_low, user_high)
    WHERE status = 'blocked';

CREATE INDEX IF NOT EXISTS idx_connections_requester ON connections(requester_id, status);
CREATE INDEX IF NOT EXISTS idx_connections_receiver  ON connections(receiver_id, status);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
