use std::future::Future;
use std::time::Duration;

use tasklink_shared::{Result, TasklinkError};

/// Run a collaborator call under a deadline, mapping expiry to
/// [`TasklinkError::Unavailable`].
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(what, ?limit, "collaborator call timed out");
            Err(TasklinkError::Unavailable(format!(
                "{what} timed out after {limit:?}"
            )))
        }
    }
}
