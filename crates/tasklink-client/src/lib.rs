//! # tasklink-client
//!
//! Client-side conversation synchronization. [`sync::ConversationSync`]
//! keeps one open conversation fresh by polling a [`backend::SyncBackend`],
//! either the in-process core service or [`remote::HttpBackend`].

pub mod backend;
pub mod config;
pub mod events;
pub mod remote;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::SyncBackend;
pub use config::SyncConfig;
pub use events::SyncEvent;
pub use remote::HttpBackend;
pub use sync::{ConversationSnapshot, ConversationSync};

/// Install a global `tracing` subscriber for host applications that do not
/// configure their own. Honors `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tasklink_client=debug,tasklink_core=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
