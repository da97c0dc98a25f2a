use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by relationship and conversation operations.
///
/// `Validation`, `Forbidden`, `InvalidState` and `Blocked` are decisions the
/// caller must react to (usually by refreshing and retrying). `Unavailable`
/// marks a collaborator timeout or failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TasklinkError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Relationship is blocked")]
    Blocked,

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl TasklinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TasklinkError::Validation(_) => ErrorKind::Validation,
            TasklinkError::InvalidState(_) => ErrorKind::InvalidState,
            TasklinkError::Forbidden(_) => ErrorKind::Forbidden,
            TasklinkError::NotFound(_) => ErrorKind::NotFound,
            TasklinkError::Blocked => ErrorKind::Blocked,
            TasklinkError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Rebuild an error from its wire representation.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation => TasklinkError::Validation(message),
            ErrorKind::InvalidState => TasklinkError::InvalidState(message),
            ErrorKind::Forbidden => TasklinkError::Forbidden(message),
            ErrorKind::NotFound => TasklinkError::NotFound(message),
            ErrorKind::Blocked => TasklinkError::Blocked,
            ErrorKind::Unavailable => TasklinkError::Unavailable(message),
        }
    }

    /// Whether a client should refresh its view and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TasklinkError::InvalidState(_) | TasklinkError::Forbidden(_)
        )
    }
}

/// Discriminant of [`TasklinkError`], used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidState,
    Forbidden,
    NotFound,
    Blocked,
    Unavailable,
}

pub type Result<T> = std::result::Result<T, TasklinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_message() {
        let err = TasklinkError::InvalidState("connection 4 is accepted".into());
        let rebuilt = TasklinkError::from_kind(err.kind(), "connection 4 is accepted".into());
        assert_eq!(rebuilt, err);
    }

    #[test]
    fn stale_view_errors_are_retryable() {
        assert!(TasklinkError::InvalidState("x".into()).is_retryable());
        assert!(TasklinkError::Forbidden("x".into()).is_retryable());
        assert!(!TasklinkError::Blocked.is_retryable());
        assert!(!TasklinkError::Validation("x".into()).is_retryable());
    }
}
