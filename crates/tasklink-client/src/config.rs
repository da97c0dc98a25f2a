use std::time::Duration;

use tasklink_core::config::env_parse;
use tasklink_shared::constants::{DEFAULT_HTTP_PORT, LOOKUP_TIMEOUT, REFRESH_INTERVAL};

/// Client synchronization settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between message refreshes while a conversation is open.
    /// Env: `TASKLINK_REFRESH_INTERVAL_MS`
    pub refresh_interval: Duration,

    /// Bound on each message load.
    /// Env: `TASKLINK_LOOKUP_TIMEOUT_MS`
    pub fetch_timeout: Duration,

    /// Base URL of the Tasklink server for [`HttpBackend`](crate::HttpBackend).
    /// Env: `TASKLINK_SERVER_URL`
    pub server_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval: REFRESH_INTERVAL,
            fetch_timeout: LOOKUP_TIMEOUT,
            server_url: format!("http://127.0.0.1:{DEFAULT_HTTP_PORT}"),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("TASKLINK_REFRESH_INTERVAL_MS") {
            config.refresh_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = env_parse::<u64>("TASKLINK_LOOKUP_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(ms.max(1));
        }
        if let Ok(url) = std::env::var("TASKLINK_SERVER_URL") {
            if !url.trim().is_empty() {
                config.server_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        config
    }
}
