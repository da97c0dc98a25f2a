//! # tasklink-core
//!
//! The relationship and conversation core of Tasklink.
//!
//! - [`graph::ConnectionGraphService`] enforces the connection state machine.
//! - [`conversations::ConversationService`] owns conversations and messages.
//! - [`directory::UserDirectoryCache`] memoizes directory profiles.
//! - [`view::RelationshipAwareDirectoryView`] joins candidates with their
//!   live connection status for listing screens.
//!
//! Authoritative state lives behind the [`ports`] traits; [`sqlite`] adapts
//! `tasklink-store` to them.

pub mod config;
pub mod conversations;
pub mod directory;
pub mod graph;
pub mod ports;
pub mod sqlite;
pub mod view;

mod lookup;

pub use config::CoreConfig;
pub use conversations::ConversationService;
pub use directory::UserDirectoryCache;
pub use graph::ConnectionGraphService;
pub use sqlite::SqliteBackend;
pub use view::RelationshipAwareDirectoryView;

#[cfg(test)]
pub(crate) mod testing;
