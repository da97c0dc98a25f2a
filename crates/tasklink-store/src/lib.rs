//! # tasklink-store
//!
//! Authoritative SQLite storage for connections, conversations, messages and
//! directory profiles.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers per table. State transitions are
//! compare-and-set updates so a command built from a stale read fails at
//! commit time instead of overwriting newer state.

pub mod connections;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod profiles;

mod error;
mod time;

pub use database::Database;
pub use error::{Result, StoreError};
