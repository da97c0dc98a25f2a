//! Connection records and their compare-and-set transitions.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tasklink_shared::relationship::{Connection, ConnectionStatus};
use tasklink_shared::types::{ordered_pair, ConnectionId, UserId};

use crate::database::Database;
use crate::error::{is_unique_violation, Result, StoreError};
use crate::time;

const COLUMNS: &str = "id, requester_id, receiver_id, status, blocked_by, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a pending request.
    ///
    /// Fails with [`StoreError::PairBlocked`] if the pair has a block and with
    /// [`StoreError::Conflict`] if a live record already exists. Both checks
    /// run inside the inserting transaction.
    pub fn create_request(
        &mut self,
        requester: UserId,
        receiver: UserId,
        now: DateTime<Utc>,
    ) -> Result<Connection> {
        let (low, high) = ordered_pair(requester, receiver);
        let ts = time::to_sql(&now);
        let tx = self.conn_mut().transaction()?;

        if pair_is_blocked(&tx, low, high)? {
            return Err(StoreError::PairBlocked);
        }

        let inserted = tx.execute(
            "INSERT INTO connections
                (requester_id, receiver_id, user_low, user_high, status, blocked_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?5)",
            params![requester.0, receiver.0, low.0, high.0, ts],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "a live connection already exists between {low} and {high}"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let id = ConnectionId(tx.last_insert_rowid());
        tx.commit()?;

        Ok(Connection {
            id,
            requester_id: requester,
            receiver_id: receiver,
            status: ConnectionStatus::Pending,
            blocked_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark the pair as blocked by `blocker`.
    ///
    /// A live record is moved to `blocked`; without one a fresh blocked record
    /// is inserted. Returns the blocked record and whether anything changed.
    pub fn block_pair(
        &mut self,
        blocker: UserId,
        target: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Connection, bool)> {
        let (low, high) = ordered_pair(blocker, target);
        let ts = time::to_sql(&now);
        let tx = self.conn_mut().transaction()?;

        if let Some(existing) = find_in_pair(&tx, low, high, "status = 'blocked'")? {
            return Ok((existing, false));
        }

        let id = match find_in_pair(&tx, low, high, "status IN ('pending', 'accepted')")? {
            Some(live) => {
                tx.execute(
                    "UPDATE connections
                     SET status = 'blocked', blocked_by = ?2, updated_at = ?3
                     WHERE id = ?1 AND status IN ('pending', 'accepted')",
                    params![live.id.0, blocker.0, ts],
                )?;
                live.id
            }
            None => {
                tx.execute(
                    "INSERT INTO connections
                        (requester_id, receiver_id, user_low, user_high, status, blocked_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'blocked', ?1, ?5, ?5)",
                    params![blocker.0, target.0, low.0, high.0, ts],
                )?;
                ConnectionId(tx.last_insert_rowid())
            }
        };

        let record = get_by_id(&tx, id)?;
        tx.commit()?;
        Ok((record, true))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move a connection from `expected` to `next`.
    ///
    /// Returns `false` without writing when the stored status is no longer
    /// `expected`.
    pub fn transition_connection(
        &self,
        id: ConnectionId,
        expected: ConnectionStatus,
        next: ConnectionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE connections SET status = ?3, updated_at = ?4
             WHERE id = ?1 AND status = ?2",
            params![id.0, expected.as_str(), next.as_str(), time::to_sql(&now)],
        )?;
        Ok(affected == 1)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_connection(&self, id: ConnectionId) -> Result<Connection> {
        get_by_id(self.conn(), id)
    }

    /// The record governing the pair right now: a block if present, else the
    /// live record, else `None`.
    pub fn find_governing_connection(&self, a: UserId, b: UserId) -> Result<Option<Connection>> {
        let (low, high) = ordered_pair(a, b);
        if let Some(blocked) = find_in_pair(self.conn(), low, high, "status = 'blocked'")? {
            return Ok(Some(blocked));
        }
        find_in_pair(self.conn(), low, high, "status IN ('pending', 'accepted')")
    }

    /// Every record with `status` that involves `user`, newest first.
    pub fn list_connections_for_user(
        &self,
        user: UserId,
        status: ConnectionStatus,
    ) -> Result<Vec<Connection>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM connections
             WHERE (requester_id = ?1 OR receiver_id = ?1) AND status = ?2
             ORDER BY updated_at DESC, id DESC"
        ))?;

        let rows = stmt.query_map(params![user.0, status.as_str()], row_to_connection)?;

        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?);
        }
        Ok(connections)
    }

    /// When `receiver` last rejected a request from `requester`.
    pub fn latest_rejection(
        &self,
        requester: UserId,
        receiver: UserId,
    ) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT updated_at FROM connections
                 WHERE requester_id = ?1 AND receiver_id = ?2 AND status = 'rejected'
                 ORDER BY updated_at DESC LIMIT 1",
                params![requester.0, receiver.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(time::parse_opt(0, raw)?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pair_is_blocked(conn: &rusqlite::Connection, low: UserId, high: UserId) -> Result<bool> {
    let blocked: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM connections
            WHERE user_low = ?1 AND user_high = ?2 AND status = 'blocked')",
        params![low.0, high.0],
        |row| row.get(0),
    )?;
    Ok(blocked)
}

fn find_in_pair(
    conn: &rusqlite::Connection,
    low: UserId,
    high: UserId,
    status_filter: &str,
) -> Result<Option<Connection>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM connections
         WHERE user_low = ?1 AND user_high = ?2 AND {status_filter}
         ORDER BY id DESC LIMIT 1"
    );
    Ok(conn
        .query_row(&sql, params![low.0, high.0], row_to_connection)
        .optional()?)
}

fn get_by_id(conn: &rusqlite::Connection, id: ConnectionId) -> Result<Connection> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM connections WHERE id = ?1"),
        params![id.0],
        row_to_connection,
    )
    .map_err(StoreError::from_query)
}

/// Map a `rusqlite::Row` to a [`Connection`].
fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    let status_str: String = row.get(3)?;
    let status = ConnectionStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown connection status '{status_str}'").into(),
        )
    })?;
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;

    Ok(Connection {
        id: ConnectionId(row.get(0)?),
        requester_id: UserId(row.get(1)?),
        receiver_id: UserId(row.get(2)?),
        status,
        blocked_by: row.get::<_, Option<i64>>(4)?.map(UserId),
        created_at: time::parse(5, &created_str)?,
        updated_at: time::parse(6, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn second_live_request_conflicts_in_either_direction() {
        let mut db = db();
        let now = Utc::now();
        db.create_request(UserId(1), UserId(2), now).unwrap();

        assert!(matches!(
            db.create_request(UserId(1), UserId(2), now),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            db.create_request(UserId(2), UserId(1), now),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn closed_record_frees_the_pair() {
        let mut db = db();
        let now = Utc::now();
        let first = db.create_request(UserId(1), UserId(2), now).unwrap();
        assert!(db
            .transition_connection(first.id, ConnectionStatus::Pending, ConnectionStatus::Rejected, now)
            .unwrap());

        let second = db.create_request(UserId(2), UserId(1), now).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(db.get_connection(first.id).unwrap().status, ConnectionStatus::Rejected);
    }

    #[test]
    fn stale_transition_is_refused() {
        let mut db = db();
        let now = Utc::now();
        let c = db.create_request(UserId(1), UserId(2), now).unwrap();
        assert!(db
            .transition_connection(c.id, ConnectionStatus::Pending, ConnectionStatus::Removed, now)
            .unwrap());
        assert!(!db
            .transition_connection(c.id, ConnectionStatus::Pending, ConnectionStatus::Accepted, now)
            .unwrap());
        assert_eq!(db.get_connection(c.id).unwrap().status, ConnectionStatus::Removed);
    }

    #[test]
    fn block_converts_live_record_and_blocks_new_requests() {
        let mut db = db();
        let now = Utc::now();
        let c = db.create_request(UserId(1), UserId(2), now).unwrap();

        let (blocked, changed) = db.block_pair(UserId(2), UserId(1), now).unwrap();
        assert!(changed);
        assert_eq!(blocked.id, c.id);
        assert_eq!(blocked.status, ConnectionStatus::Blocked);
        assert_eq!(blocked.blocked_by, Some(UserId(2)));

        let (again, changed) = db.block_pair(UserId(2), UserId(1), now).unwrap();
        assert!(!changed);
        assert_eq!(again.id, c.id);

        assert!(matches!(
            db.create_request(UserId(1), UserId(2), now),
            Err(StoreError::PairBlocked)
        ));
    }

    #[test]
    fn block_without_history_inserts_record() {
        let mut db = db();
        let (blocked, changed) = db.block_pair(UserId(5), UserId(9), Utc::now()).unwrap();
        assert!(changed);
        assert_eq!(blocked.requester_id, UserId(5));
        assert_eq!(blocked.receiver_id, UserId(9));
        let governing = db.find_governing_connection(UserId(9), UserId(5)).unwrap();
        assert_eq!(governing.map(|c| c.id), Some(blocked.id));
    }

    #[test]
    fn lists_by_status_for_either_side() {
        let mut db = db();
        let now = Utc::now();
        db.create_request(UserId(1), UserId(2), now).unwrap();
        db.create_request(UserId(3), UserId(1), now).unwrap();
        db.create_request(UserId(4), UserId(5), now).unwrap();

        let pending = db
            .list_connections_for_user(UserId(1), ConnectionStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(db
            .list_connections_for_user(UserId(1), ConnectionStatus::Accepted)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn latest_rejection_is_directional() {
        let mut db = db();
        let earlier = Utc::now() - Duration::hours(2);
        let c = db.create_request(UserId(1), UserId(2), earlier).unwrap();
        db.transition_connection(c.id, ConnectionStatus::Pending, ConnectionStatus::Rejected, earlier)
            .unwrap();

        assert!(db.latest_rejection(UserId(1), UserId(2)).unwrap().is_some());
        assert!(db.latest_rejection(UserId(2), UserId(1)).unwrap().is_none());
    }

    #[test]
    fn unknown_connection_is_not_found() {
        assert!(matches!(
            db().get_connection(ConnectionId(77)),
            Err(StoreError::NotFound)
        ));
    }
}
