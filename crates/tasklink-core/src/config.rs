//! Core configuration loaded from environment variables.
//!
//! Every setting has a default so the services work with zero configuration.

use std::str::FromStr;
use std::time::Duration;

use tasklink_shared::constants::{DEFAULT_MESSAGE_WINDOW, LOOKUP_TIMEOUT};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Bound on each store or directory call.
    /// Env: `TASKLINK_LOOKUP_TIMEOUT_MS`
    pub lookup_timeout: Duration,

    /// Minimum wait before re-sending a request the receiver rejected.
    /// `None` allows an immediate re-request.
    /// Env: `TASKLINK_REQUEST_COOLDOWN_SECS` (0 disables)
    pub rerequest_cooldown: Option<Duration>,

    /// Number of most recent messages returned by a message load.
    /// Env: `TASKLINK_MESSAGE_WINDOW`
    pub message_window: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: LOOKUP_TIMEOUT,
            rerequest_cooldown: None,
            message_window: DEFAULT_MESSAGE_WINDOW,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("TASKLINK_LOOKUP_TIMEOUT_MS") {
            config.lookup_timeout = Duration::from_millis(ms.max(1));
        }

        if let Some(secs) = env_parse::<u64>("TASKLINK_REQUEST_COOLDOWN_SECS") {
            config.rerequest_cooldown = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(window) = env_parse::<u32>("TASKLINK_MESSAGE_WINDOW") {
            if window > 0 {
                config.message_window = window;
            }
        }

        config
    }
}

/// Read and parse an environment variable, warning on unparsable values.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.lookup_timeout, LOOKUP_TIMEOUT);
        assert!(config.rerequest_cooldown.is_none());
        assert_eq!(config.message_window, DEFAULT_MESSAGE_WINDOW);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("TASKLINK_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse::<u64>("TASKLINK_TEST_ENV_PARSE"), None);
        std::env::set_var("TASKLINK_TEST_ENV_PARSE", " 42 ");
        assert_eq!(env_parse::<u64>("TASKLINK_TEST_ENV_PARSE"), Some(42));
        std::env::remove_var("TASKLINK_TEST_ENV_PARSE");
    }
}
