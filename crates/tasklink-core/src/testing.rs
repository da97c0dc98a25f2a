//! Test doubles for the collaborator ports.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tasklink_shared::directory::DirectoryProfile;
use tasklink_shared::relationship::{Connection, ConnectionStatus};
use tasklink_shared::types::{ConnectionId, UserId};
use tasklink_shared::{Result, TasklinkError};

use crate::ports::{ConnectionStore, ProfileDirectory};
use crate::sqlite::SqliteBackend;

pub fn profile(id: i64) -> DirectoryProfile {
    DirectoryProfile {
        user_id: UserId(id),
        first_name: format!("User{id}"),
        last_name: "Test".into(),
        avatar_url: None,
        location: Some("Testville".into()),
        skills: vec!["assembly".into()],
    }
}

/// Directory that records how often each id was fetched.
pub struct CountingDirectory {
    profiles: HashMap<UserId, DirectoryProfile>,
    failing: HashSet<UserId>,
    delay: Duration,
    calls: Mutex<HashMap<UserId, usize>>,
}

impl CountingDirectory {
    pub fn with_users(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            profiles: ids.into_iter().map(|id| (UserId(id), profile(id))).collect(),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.failing.extend(ids.into_iter().map(UserId));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls_for(&self, id: i64) -> usize {
        self.calls.lock().unwrap().get(&UserId(id)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for CountingDirectory {
    async fn fetch_public_profile(&self, user_id: UserId) -> Result<Option<DirectoryProfile>> {
        *self.calls.lock().unwrap().entry(user_id).or_insert(0) += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&user_id) {
            return Err(TasklinkError::Unavailable(format!("directory down for {user_id}")));
        }
        Ok(self.profiles.get(&user_id).cloned())
    }
}

/// Connection store whose status lookups are slow or failing for some users.
pub struct FlakyStatusStore {
    inner: Arc<SqliteBackend>,
    slow: HashSet<UserId>,
    failing: HashSet<UserId>,
    delay: Duration,
}

impl FlakyStatusStore {
    pub fn new(inner: Arc<SqliteBackend>) -> Self {
        Self {
            inner,
            slow: HashSet::new(),
            failing: HashSet::new(),
            delay: Duration::from_secs(60),
        }
    }

    pub fn slow_for(mut self, id: i64) -> Self {
        self.slow.insert(UserId(id));
        self
    }

    pub fn failing_for(mut self, id: i64) -> Self {
        self.failing.insert(UserId(id));
        self
    }
}

/// Connection store that serves a fixed snapshot for one record's reads,
/// simulating a caller acting on a stale view.
pub struct StaleStore {
    inner: Arc<SqliteBackend>,
    snapshot: Connection,
}

impl StaleStore {
    pub fn new(inner: Arc<SqliteBackend>, snapshot: Connection) -> Self {
        Self { inner, snapshot }
    }
}

macro_rules! delegate_connection_store {
    ($ty:ty, |$this:ident, $id:ident| $get:expr, |$s:ident, $a:ident, $b:ident| $find:expr) => {
        #[async_trait::async_trait]
        impl ConnectionStore for $ty {
            async fn create_request(
                &self,
                requester: UserId,
                receiver: UserId,
                now: DateTime<Utc>,
            ) -> Result<Connection> {
                self.inner.create_request(requester, receiver, now).await
            }

            async fn block_pair(
                &self,
                blocker: UserId,
                target: UserId,
                now: DateTime<Utc>,
            ) -> Result<(Connection, bool)> {
                self.inner.block_pair(blocker, target, now).await
            }

            async fn transition(
                &self,
                id: ConnectionId,
                expected: ConnectionStatus,
                next: ConnectionStatus,
                now: DateTime<Utc>,
            ) -> Result<bool> {
                self.inner.transition(id, expected, next, now).await
            }

            async fn get_connection(&self, $id: ConnectionId) -> Result<Connection> {
                let $this = self;
                $get
            }

            async fn find_governing(&self, $a: UserId, $b: UserId) -> Result<Option<Connection>> {
                let $s = self;
                $find
            }

            async fn list_for_user(
                &self,
                user: UserId,
                status: ConnectionStatus,
            ) -> Result<Vec<Connection>> {
                self.inner.list_for_user(user, status).await
            }

            async fn latest_rejection(
                &self,
                requester: UserId,
                receiver: UserId,
            ) -> Result<Option<DateTime<Utc>>> {
                self.inner.latest_rejection(requester, receiver).await
            }
        }
    };
}

delegate_connection_store!(
    StaleStore,
    |this, id| {
        if id == this.snapshot.id {
            Ok(this.snapshot.clone())
        } else {
            this.inner.get_connection(id).await
        }
    },
    |this, a, b| this.inner.find_governing(a, b).await
);

delegate_connection_store!(
    FlakyStatusStore,
    |this, id| this.inner.get_connection(id).await,
    |this, a, b| {
        if this.failing.contains(&a) || this.failing.contains(&b) {
            return Err(TasklinkError::Unavailable("status backend down".into()));
        }
        if this.slow.contains(&a) || this.slow.contains(&b) {
            tokio::time::sleep(this.delay).await;
        }
        this.inner.find_governing(a, b).await
    }
);
