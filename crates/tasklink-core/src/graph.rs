//! The connection graph: relationship commands and queries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tasklink_shared::relationship::{
    authorize, Connection, ConnectionEntry, ConnectionStatus, PendingRequest, RelationshipStatus,
    Transition,
};
use tasklink_shared::types::{ConnectionId, UserId};
use tasklink_shared::{Result, TasklinkError};
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::lookup::bounded;
use crate::ports::ConnectionStore;

/// Enforces the relationship state machine over a [`ConnectionStore`].
///
/// Every command re-reads the record, asks [`authorize`] for the target
/// status and commits with a compare-and-set, so a command built from a stale
/// view fails with `InvalidState` instead of overwriting newer state.
pub struct ConnectionGraphService {
    store: Arc<dyn ConnectionStore>,
    timeout: Duration,
    rerequest_cooldown: Option<Duration>,
}

impl ConnectionGraphService {
    pub fn new(store: Arc<dyn ConnectionStore>, config: &CoreConfig) -> Self {
        Self {
            store,
            timeout: config.lookup_timeout,
            rerequest_cooldown: config.rerequest_cooldown,
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn send_request(&self, requester: UserId, receiver: UserId) -> Result<Connection> {
        if requester == receiver {
            return Err(TasklinkError::Validation(
                "cannot send a connection request to yourself".into(),
            ));
        }

        if let Some(cooldown) = self.rerequest_cooldown {
            let rejected_at = bounded(
                self.timeout,
                "rejection lookup",
                self.store.latest_rejection(requester, receiver),
            )
            .await?;
            if let Some(at) = rejected_at {
                let elapsed = (Utc::now() - at).to_std().unwrap_or_default();
                if elapsed < cooldown {
                    return Err(TasklinkError::InvalidState(format!(
                        "request was rejected recently; retry in {}s",
                        (cooldown - elapsed).as_secs().max(1)
                    )));
                }
            }
        }

        let connection = bounded(
            self.timeout,
            "create connection request",
            self.store.create_request(requester, receiver, Utc::now()),
        )
        .await?;

        info!(
            connection = %connection.id,
            requester = %requester,
            receiver = %receiver,
            "Connection request sent"
        );
        Ok(connection)
    }

    pub async fn accept(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.apply(id, acting, Transition::Accept).await
    }

    pub async fn reject(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.apply(id, acting, Transition::Reject).await
    }

    /// Withdraw a pending request. Only the requester may cancel.
    pub async fn cancel(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.apply(id, acting, Transition::Cancel).await
    }

    /// End a relationship: cancels a pending request or unfriends an
    /// accepted connection, whichever the record currently is.
    pub async fn remove(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        let record = self.load(id).await?;
        let transition = match record.status {
            ConnectionStatus::Pending => Transition::Cancel,
            _ => Transition::Remove,
        };
        self.commit(record, acting, transition).await
    }

    /// Block `target` on behalf of `acting`. Either participant may block
    /// from any status. Blocking an already blocked pair returns the existing
    /// record unchanged, including when the other participant is the blocker.
    pub async fn block(&self, target: UserId, acting: UserId) -> Result<Connection> {
        if target == acting {
            return Err(TasklinkError::Validation("cannot block yourself".into()));
        }

        let (record, changed) = bounded(
            self.timeout,
            "block pair",
            self.store.block_pair(acting, target, Utc::now()),
        )
        .await?;

        if changed {
            info!(connection = %record.id, blocker = %acting, target = %target, "Pair blocked");
        } else {
            debug!(connection = %record.id, "Pair already blocked");
        }
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Relationship between `viewer` and `other` from the viewer's side.
    /// A pair with no history resolves to `none`.
    pub async fn get_status(&self, viewer: UserId, other: UserId) -> Result<RelationshipStatus> {
        if viewer == other {
            return Ok(RelationshipStatus::none());
        }
        Ok(self
            .find(viewer, other)
            .await?
            .map(|record| RelationshipStatus::from_record(viewer, &record))
            .unwrap_or_else(RelationshipStatus::none))
    }

    /// Accepted connections of `user`, resolved to the other participant.
    pub async fn list_connections(&self, user: UserId) -> Result<Vec<ConnectionEntry>> {
        let records = bounded(
            self.timeout,
            "list connections",
            self.store.list_for_user(user, ConnectionStatus::Accepted),
        )
        .await?;

        Ok(records
            .into_iter()
            .map(|c| ConnectionEntry {
                connection_id: c.id,
                other_user_id: c.other_party(user),
                since: c.updated_at,
            })
            .collect())
    }

    /// Pending requests involving `user`, each tagged with the user's role so
    /// callers can split sent from received.
    pub async fn list_pending_requests(&self, user: UserId) -> Result<Vec<PendingRequest>> {
        let records = bounded(
            self.timeout,
            "list pending requests",
            self.store.list_for_user(user, ConnectionStatus::Pending),
        )
        .await?;

        Ok(records
            .into_iter()
            .filter_map(|c| {
                let role = c.role_of(user)?;
                Some(PendingRequest {
                    connection_id: c.id,
                    other_user_id: c.other_party(user),
                    role,
                    created_at: c.created_at,
                })
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn apply(&self, id: ConnectionId, acting: UserId, transition: Transition) -> Result<Connection> {
        let record = self.load(id).await?;
        self.commit(record, acting, transition).await
    }

    async fn commit(
        &self,
        record: Connection,
        acting: UserId,
        transition: Transition,
    ) -> Result<Connection> {
        let role = record.role_of(acting).ok_or_else(|| {
            TasklinkError::Forbidden(format!(
                "user {acting} is not a participant of connection {}",
                record.id
            ))
        })?;
        let next = authorize(record.status, role, transition)?;

        let now = Utc::now();
        let applied = bounded(
            self.timeout,
            "connection transition",
            self.store.transition(record.id, record.status, next, now),
        )
        .await?;

        if !applied {
            warn!(
                connection = %record.id,
                expected = %record.status,
                transition = transition.as_str(),
                "Connection changed before commit"
            );
            return Err(TasklinkError::InvalidState(format!(
                "connection {} is no longer {}; refresh and retry",
                record.id, record.status
            )));
        }

        info!(
            connection = %record.id,
            actor = %acting,
            from = %record.status,
            to = %next,
            "Connection transition applied"
        );

        Ok(Connection {
            status: next,
            updated_at: now,
            ..record
        })
    }

    async fn load(&self, id: ConnectionId) -> Result<Connection> {
        bounded(self.timeout, "connection lookup", self.store.get_connection(id))
            .await
            .map_err(|e| match e {
                TasklinkError::NotFound(_) => TasklinkError::NotFound(format!("connection {id}")),
                other => other,
            })
    }

    async fn find(&self, a: UserId, b: UserId) -> Result<Option<Connection>> {
        bounded(self.timeout, "status lookup", self.store.find_governing(a, b)).await
    }
}
