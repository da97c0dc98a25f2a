//! JSON bodies exchanged between `tasklink-server` and its clients.
//!
//! Every response uses the same tagged envelope so clients decode exactly one
//! shape per endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, TasklinkError};
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApiResponse<T> {
    Ok { data: T },
    Error { error: ErrorBody },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse::Ok { data }
    }

    pub fn error(err: &TasklinkError) -> Self {
        ApiResponse::Error {
            error: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }

    pub fn into_result(self) -> Result<T, TasklinkError> {
        match self {
            ApiResponse::Ok { data } => Ok(data),
            ApiResponse::Error { error } => Err(TasklinkError::from_kind(error.kind, error.message)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequestBody {
    pub receiver_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageBody {
    pub recipient_id: UserId,
    pub content: String,
}

/// Acknowledgement for commands that return no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub changed: bool,
}
