//! # tasklink-shared
//!
//! Types shared by every Tasklink crate: identifier newtypes, the connection
//! and conversation records, the relationship permission table, the error
//! taxonomy surfaced to callers, and the JSON envelope used on the wire.

pub mod constants;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod protocol;
pub mod relationship;
pub mod types;

pub use error::{ErrorKind, Result, TasklinkError};
pub use types::{ConnectionId, ConversationId, MessageId, UserId};
