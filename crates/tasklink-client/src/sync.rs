//! Keeps the open conversation's messages fresh.
//!
//! At most one conversation is open per [`ConversationSync`]. Opening starts
//! a refresh loop that loads immediately and then on every
//! `refresh_interval` tick. A tick that arrives while a load is still running
//! is skipped, so there is never more than one load in flight. Closing, or
//! opening a different conversation, aborts the loop and bumps the view
//! generation under the view lock; a load that finishes afterwards sees a
//! different generation and is discarded.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tasklink_shared::conversation::{sort_messages, Message};
use tasklink_shared::types::{ConversationId, MessageId, UserId};
use tasklink_shared::{Result, TasklinkError};

use crate::backend::SyncBackend;
use crate::config::SyncConfig;
use crate::events::SyncEvent;

const EVENT_CAPACITY: usize = 64;

/// Point-in-time copy of the local view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub conversation_id: Option<ConversationId>,
    pub messages: Vec<Message>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct LocalView {
    generation: u64,
    conversation_id: Option<ConversationId>,
    messages: Vec<Message>,
    last_synced_at: Option<DateTime<Utc>>,
}

struct ActiveLoop {
    conversation_id: ConversationId,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Everything a refresh loop needs, detached from `ConversationSync`.
#[derive(Clone)]
struct LoopContext {
    backend: Arc<dyn SyncBackend>,
    viewer: UserId,
    conversation_id: ConversationId,
    generation: u64,
    view: Arc<Mutex<LocalView>>,
    events: broadcast::Sender<SyncEvent>,
    refresh: Arc<Notify>,
    interval: Duration,
    fetch_timeout: Duration,
}

pub struct ConversationSync {
    backend: Arc<dyn SyncBackend>,
    viewer: UserId,
    config: SyncConfig,
    view: Arc<Mutex<LocalView>>,
    active: Option<ActiveLoop>,
    events: broadcast::Sender<SyncEvent>,
}

impl ConversationSync {
    pub fn new(backend: Arc<dyn SyncBackend>, viewer: UserId, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            viewer,
            config,
            view: Arc::new(Mutex::new(LocalView::default())),
            active: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn viewer(&self) -> UserId {
        self.viewer
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.active.as_ref().map(|a| a.conversation_id)
    }

    /// Open `conversation_id`, replacing whatever was open.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&mut self, conversation_id: ConversationId) {
        self.stop_loop();

        let generation = {
            let mut view = lock_view(&self.view);
            view.generation += 1;
            view.conversation_id = Some(conversation_id);
            view.messages.clear();
            view.last_synced_at = None;
            view.generation
        };

        let refresh = Arc::new(Notify::new());
        let ctx = LoopContext {
            backend: Arc::clone(&self.backend),
            viewer: self.viewer,
            conversation_id,
            generation,
            view: Arc::clone(&self.view),
            events: self.events.clone(),
            refresh: Arc::clone(&refresh),
            interval: self.config.refresh_interval,
            fetch_timeout: self.config.fetch_timeout,
        };

        info!(conversation = %conversation_id, generation, "Opening conversation");
        let task = tokio::spawn(refresh_loop(ctx));
        self.active = Some(ActiveLoop {
            conversation_id,
            refresh,
            task,
        });
    }

    /// Close the open conversation, if any. No refresh is applied afterwards.
    pub fn close(&mut self) {
        let Some(closed) = self.stop_loop() else {
            return;
        };

        {
            let mut view = lock_view(&self.view);
            view.generation += 1;
            view.conversation_id = None;
            view.messages.clear();
            view.last_synced_at = None;
        }

        info!(conversation = %closed, "Closed conversation");
        let _ = self.events.send(SyncEvent::Closed {
            conversation_id: closed,
        });
    }

    /// Send into the open conversation and refresh right away.
    pub async fn send_message(&self, content: &str) -> Result<Message> {
        let active = self.require_active()?;
        let message = self
            .backend
            .send_message(self.viewer, active.conversation_id, content)
            .await?;
        active.refresh.notify_one();
        Ok(message)
    }

    /// Mark a message in the open conversation as read. Returns whether the
    /// read marker was newly set.
    pub async fn mark_read(&self, message_id: MessageId) -> Result<bool> {
        let active = self.require_active()?;
        let changed = self.backend.mark_read(self.viewer, message_id).await?;
        if changed {
            active.refresh.notify_one();
        }
        Ok(changed)
    }

    /// Ask the loop to refresh without waiting for the next tick.
    pub fn refresh_now(&self) {
        if let Some(active) = &self.active {
            active.refresh.notify_one();
        }
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let view = lock_view(&self.view);
        ConversationSnapshot {
            conversation_id: view.conversation_id,
            messages: view.messages.clone(),
            last_synced_at: view.last_synced_at,
        }
    }

    fn require_active(&self) -> Result<&ActiveLoop> {
        self.active
            .as_ref()
            .ok_or_else(|| TasklinkError::InvalidState("no conversation is open".into()))
    }

    fn stop_loop(&mut self) -> Option<ConversationId> {
        let active = self.active.take()?;
        active.task.abort();
        debug!(conversation = %active.conversation_id, "Stopped refresh loop");
        Some(active.conversation_id)
    }
}

impl Drop for ConversationSync {
    fn drop(&mut self) {
        self.stop_loop();
    }
}

async fn refresh_loop(ctx: LoopContext) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = ctx.refresh.notified() => {
                debug!(conversation = %ctx.conversation_id, "Immediate refresh");
            }
        }

        let outcome = tokio::time::timeout(
            ctx.fetch_timeout,
            ctx.backend.load_messages(ctx.viewer, ctx.conversation_id),
        )
        .await;

        match outcome {
            Ok(Ok(messages)) => {
                apply_refresh(&ctx, messages);
            }
            Ok(Err(e)) => report_failure(&ctx, e.to_string()),
            Err(_) => report_failure(
                &ctx,
                format!("message load timed out after {:?}", ctx.fetch_timeout),
            ),
        }
    }
}

/// Install `messages` if the view still belongs to this loop's generation.
/// Returns whether the view was touched.
fn apply_refresh(ctx: &LoopContext, mut messages: Vec<Message>) -> bool {
    sort_messages(&mut messages);

    let count = messages.len();
    let changed = {
        let mut view = lock_view(&ctx.view);
        if view.generation != ctx.generation {
            debug!(
                conversation = %ctx.conversation_id,
                stale = ctx.generation,
                current = view.generation,
                "Discarding refresh for a closed conversation"
            );
            return false;
        }
        let changed = view.messages != messages;
        view.messages = messages;
        view.last_synced_at = Some(Utc::now());
        changed
    };

    if changed {
        let _ = ctx.events.send(SyncEvent::MessagesUpdated {
            conversation_id: ctx.conversation_id,
            count,
        });
    }
    true
}

fn report_failure(ctx: &LoopContext, error: String) {
    if lock_view(&ctx.view).generation != ctx.generation {
        return;
    }
    warn!(conversation = %ctx.conversation_id, %error, "Refresh failed");
    let _ = ctx.events.send(SyncEvent::RefreshFailed {
        conversation_id: ctx.conversation_id,
        error,
    });
}

fn lock_view(view: &Mutex<LocalView>) -> MutexGuard<'_, LocalView> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
