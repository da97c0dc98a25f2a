//! Memoized directory profile lookups.
//!
//! A resolved id is not fetched again until the cache is cleared. Misses and
//! failures are not cached, so a later call retries them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tasklink_shared::directory::DirectoryProfile;
use tasklink_shared::types::UserId;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::lookup::bounded;
use crate::ports::ProfileDirectory;

pub struct UserDirectoryCache {
    directory: Arc<dyn ProfileDirectory>,
    entries: RwLock<HashMap<UserId, DirectoryProfile>>,
    fetch_timeout: Duration,
}

impl UserDirectoryCache {
    pub fn new(directory: Arc<dyn ProfileDirectory>, config: &CoreConfig) -> Self {
        Self {
            directory,
            entries: RwLock::new(HashMap::new()),
            fetch_timeout: config.lookup_timeout,
        }
    }

    /// Resolve `ids` to profiles, fetching uncached ids in parallel.
    ///
    /// Ids that are unknown, time out, or fail are omitted from the result.
    pub async fn resolve(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> HashMap<UserId, DirectoryProfile> {
        let wanted: BTreeSet<UserId> = ids.into_iter().collect();

        let mut resolved = HashMap::with_capacity(wanted.len());
        let mut missing = Vec::new();
        {
            let entries = self.entries.read().await;
            for id in wanted {
                match entries.get(&id) {
                    Some(profile) => {
                        resolved.insert(id, profile.clone());
                    }
                    None => missing.push(id),
                }
            }
        }

        if missing.is_empty() {
            debug!(hits = resolved.len(), "Directory lookup served from cache");
            return resolved;
        }

        let fetches = missing.iter().map(|&id| async move {
            let result = bounded(
                self.fetch_timeout,
                "directory fetch",
                self.directory.fetch_public_profile(id),
            )
            .await;
            (id, result)
        });

        let mut fetched = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(Some(profile)) => fetched.push(profile),
                Ok(None) => debug!(user = %id, "Directory profile not found"),
                Err(e) => warn!(user = %id, error = %e, "Directory lookup failed"),
            }
        }

        debug!(
            hits = resolved.len(),
            fetched = fetched.len(),
            requested = missing.len(),
            "Directory lookup completed"
        );

        if !fetched.is_empty() {
            let mut entries = self.entries.write().await;
            for profile in fetched {
                entries.insert(profile.user_id, profile.clone());
                resolved.insert(profile.user_id, profile);
            }
        }

        resolved
    }

    /// Resolve a single id.
    pub async fn get(&self, id: UserId) -> Option<DirectoryProfile> {
        self.resolve([id]).await.remove(&id)
    }

    /// Return a cached profile without fetching.
    pub async fn cached(&self, id: UserId) -> Option<DirectoryProfile> {
        self.entries.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every cached profile.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        debug!(removed, "Directory cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingDirectory;

    fn ids(raw: &[i64]) -> Vec<UserId> {
        raw.iter().copied().map(UserId).collect()
    }

    #[tokio::test]
    async fn overlapping_batches_fetch_each_id_once() {
        let directory = Arc::new(CountingDirectory::with_users(1..=6));
        let cache = UserDirectoryCache::new(directory.clone(), &CoreConfig::default());

        assert_eq!(cache.resolve(ids(&[1, 2, 3])).await.len(), 3);
        assert_eq!(cache.resolve(ids(&[2, 3, 4, 5])).await.len(), 4);
        assert_eq!(cache.resolve(ids(&[1, 5, 6, 6])).await.len(), 3);

        for id in 1..=6 {
            assert_eq!(directory.calls_for(id), 1, "user {id} fetched more than once");
        }
        assert_eq!(directory.total_calls(), 6);
    }

    #[tokio::test]
    async fn failures_are_omitted_not_fatal() {
        let directory = Arc::new(CountingDirectory::with_users([1, 2]).failing([2]));
        let cache = UserDirectoryCache::new(directory.clone(), &CoreConfig::default());

        let resolved = cache.resolve(ids(&[1, 2, 99])).await;
        assert!(resolved.contains_key(&UserId(1)));
        assert!(!resolved.contains_key(&UserId(2)));
        assert!(!resolved.contains_key(&UserId(99)));
        assert_eq!(cache.len().await, 1);

        // Misses are retried on the next call.
        cache.resolve(ids(&[2])).await;
        assert_eq!(directory.calls_for(2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_directory_times_out_to_unknown_user() {
        let directory = Arc::new(CountingDirectory::with_users([1]).delayed(Duration::from_secs(30)));
        let config = CoreConfig {
            lookup_timeout: Duration::from_millis(50),
            ..CoreConfig::default()
        };
        let cache = UserDirectoryCache::new(directory, &config);

        assert!(cache.get(UserId(1)).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clear_forces_refetch() {
        let directory = Arc::new(CountingDirectory::with_users([1]));
        let cache = UserDirectoryCache::new(directory.clone(), &CoreConfig::default());

        assert!(cache.get(UserId(1)).await.is_some());
        assert!(cache.cached(UserId(1)).await.is_some());
        cache.clear().await;
        assert!(cache.cached(UserId(1)).await.is_none());
        cache.get(UserId(1)).await;
        assert_eq!(directory.calls_for(1), 2);
    }
}
