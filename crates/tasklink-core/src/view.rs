//! Relationship-aware user listings.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tasklink_shared::directory::DirectoryEntry;
use tasklink_shared::relationship::RelationshipStatus;
use tasklink_shared::types::UserId;
use tracing::warn;

use crate::config::CoreConfig;
use crate::directory::UserDirectoryCache;
use crate::graph::ConnectionGraphService;
use crate::lookup::bounded;

/// Joins candidate users with the viewer's live connection status.
///
/// Lookups run in parallel and each is bounded by the lookup timeout; a
/// failed or slow lookup degrades that candidate to `none` rather than
/// failing or stalling the whole list.
pub struct RelationshipAwareDirectoryView {
    graph: Arc<ConnectionGraphService>,
    profiles: Option<Arc<UserDirectoryCache>>,
    lookup_timeout: Duration,
}

impl RelationshipAwareDirectoryView {
    pub fn new(graph: Arc<ConnectionGraphService>, config: &CoreConfig) -> Self {
        Self {
            graph,
            profiles: None,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Also attach directory profiles to each entry.
    pub fn with_profiles(mut self, cache: Arc<UserDirectoryCache>) -> Self {
        self.profiles = Some(cache);
        self
    }

    /// One entry per distinct candidate, in input order, excluding `viewer`.
    pub async fn build_view(&self, viewer: UserId, candidates: &[UserId]) -> Vec<DirectoryEntry> {
        let mut seen = HashSet::new();
        let candidates: Vec<UserId> = candidates
            .iter()
            .copied()
            .filter(|&id| id != viewer && seen.insert(id))
            .collect();

        let statuses = join_all(candidates.iter().map(|&candidate| async move {
            match bounded(
                self.lookup_timeout,
                "status lookup",
                self.graph.get_status(viewer, candidate),
            )
            .await
            {
                Ok(status) => status,
                Err(e) => {
                    warn!(viewer = %viewer, candidate = %candidate, error = %e, "Status lookup degraded to none");
                    RelationshipStatus::none()
                }
            }
        }));

        let (statuses, mut profiles) = match &self.profiles {
            Some(cache) => {
                let (statuses, profiles) =
                    futures::join!(statuses, cache.resolve(candidates.iter().copied()));
                (statuses, profiles)
            }
            None => (statuses.await, Default::default()),
        };

        candidates
            .into_iter()
            .zip(statuses)
            .map(|(user_id, relationship)| DirectoryEntry {
                user_id,
                profile: profiles.remove(&user_id),
                perspective: relationship.perspective(),
                relationship,
            })
            .collect()
    }
}
