use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "Tasklink";

/// Interval between message refreshes while a conversation is open
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3);

/// Upper bound for any single outbound lookup (status, profile, message load)
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of most recent messages returned by a message load
pub const DEFAULT_MESSAGE_WINDOW: u32 = 200;

/// Maximum message length in characters
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Length of the content preview kept in conversation summaries
pub const SUMMARY_PREVIEW_CHARS: usize = 80;

/// Header carrying the authenticated acting user id
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
