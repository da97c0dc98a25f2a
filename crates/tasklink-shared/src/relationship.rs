//! Connection records and the relationship state machine.
//!
//! All "who may do what" rules live in [`authorize`]; services look up the
//! acting party's [`Role`] on a record and ask the table for the target
//! status instead of branching on their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TasklinkError;
use crate::types::{ConnectionId, UserId};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
    Blocked,
    Removed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
            ConnectionStatus::Blocked => "blocked",
            ConnectionStatus::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "blocked" => Some(Self::Blocked),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }

    /// Pending and accepted records govern the current relationship.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Pending | ConnectionStatus::Accepted)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A directed relationship request between two distinct users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub requester_id: UserId,
    pub receiver_id: UserId,
    pub status: ConnectionStatus,
    /// Which participant applied the block, when `status` is blocked.
    pub blocked_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.requester_id {
            Some(Role::Requester)
        } else if user == self.receiver_id {
            Some(Role::Receiver)
        } else {
            None
        }
    }

    /// The participant that is not `user`.
    pub fn other_party(&self, user: UserId) -> UserId {
        if user == self.requester_id {
            self.receiver_id
        } else {
            self.requester_id
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.role_of(user).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Accept,
    Reject,
    /// Requester withdraws a pending request.
    Cancel,
    /// Either participant ends an accepted connection.
    Remove,
    Block,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
            Transition::Remove => "remove",
            Transition::Block => "block",
        }
    }
}

/// Resolve the status a transition leads to, or why it is not allowed.
pub fn authorize(
    status: ConnectionStatus,
    role: Role,
    transition: Transition,
) -> Result<ConnectionStatus, TasklinkError> {
    use ConnectionStatus::*;
    use Transition::*;

    let forbidden = |who: &str| {
        Err(TasklinkError::Forbidden(format!(
            "only the {who} may {} a {status} connection",
            transition.as_str()
        )))
    };

    match (status, transition) {
        (Pending, Accept) | (Pending, Reject) => match role {
            Role::Receiver if transition == Accept => Ok(Accepted),
            Role::Receiver => Ok(Rejected),
            Role::Requester => forbidden("receiver"),
        },
        (Pending, Cancel) => match role {
            Role::Requester => Ok(Removed),
            Role::Receiver => forbidden("requester"),
        },
        (Accepted, Remove) => Ok(Removed),
        (Pending, Block) | (Accepted, Block) => Ok(Blocked),
        _ => Err(TasklinkError::InvalidState(format!(
            "cannot {} a {status} connection",
            transition.as_str()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Relationship state of a pair as resolved for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedStatus {
    None,
    Pending,
    Accepted,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    pub status: ResolvedStatus,
    /// True when the viewer sent the governing pending request.
    pub is_requester: bool,
    pub connection_id: Option<ConnectionId>,
    pub blocked_by_viewer: bool,
}

impl RelationshipStatus {
    pub fn none() -> Self {
        Self {
            status: ResolvedStatus::None,
            is_requester: false,
            connection_id: None,
            blocked_by_viewer: false,
        }
    }

    /// Resolve a governing record (live or blocked) from `viewer`'s side.
    pub fn from_record(viewer: UserId, record: &Connection) -> Self {
        let status = match record.status {
            ConnectionStatus::Pending => ResolvedStatus::Pending,
            ConnectionStatus::Accepted => ResolvedStatus::Accepted,
            ConnectionStatus::Blocked => ResolvedStatus::Blocked,
            ConnectionStatus::Rejected | ConnectionStatus::Removed => return Self::none(),
        };
        Self {
            status,
            is_requester: status == ResolvedStatus::Pending && record.requester_id == viewer,
            connection_id: Some(record.id),
            blocked_by_viewer: record.blocked_by == Some(viewer),
        }
    }

    pub fn perspective(&self) -> Perspective {
        match self.status {
            ResolvedStatus::None => Perspective::None,
            ResolvedStatus::Pending if self.is_requester => Perspective::Sent,
            ResolvedStatus::Pending => Perspective::Received,
            ResolvedStatus::Accepted => Perspective::Connected,
            ResolvedStatus::Blocked => Perspective::Blocked,
        }
    }
}

/// What a listing UI shows next to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    None,
    Sent,
    Received,
    Connected,
    Blocked,
}

/// An accepted connection seen from one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub connection_id: ConnectionId,
    pub other_user_id: UserId,
    pub since: DateTime<Utc>,
}

/// A pending request annotated with the viewer's side of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub connection_id: ConnectionId,
    pub other_user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn is_sent(&self) -> bool {
        self.role == Role::Requester
    }
}
