use std::sync::Arc;
use std::time::Duration;

use tasklink_client::{ConversationSync, SyncBackend, SyncConfig, SyncEvent};
use tasklink_core::{ConversationService, CoreConfig, SqliteBackend};
use tasklink_shared::types::UserId;
use tasklink_shared::TasklinkError;

const CUSTOMER: UserId = UserId(10);
const TASKER: UserId = UserId(20);

fn service() -> Arc<ConversationService> {
    let backend = Arc::new(SqliteBackend::in_memory().unwrap());
    Arc::new(ConversationService::new(backend, &CoreConfig::default()))
}

fn config() -> SyncConfig {
    SyncConfig {
        refresh_interval: Duration::from_millis(50),
        fetch_timeout: Duration::from_secs(2),
        ..SyncConfig::default()
    }
}

async fn wait_for_update(rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> usize {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Ok(SyncEvent::MessagesUpdated { count, .. })) => return count,
            Ok(Ok(_)) => continue,
            other => panic!("no update arrived: {other:?}"),
        }
    }
}

#[tokio::test]
async fn both_sides_see_the_exchange() {
    let service = service();
    let hello = service
        .send_direct_message(CUSTOMER, TASKER, "Can you fix a leaking tap?")
        .await
        .unwrap();

    let mut tasker = ConversationSync::new(service.clone(), TASKER, config());
    let mut rx = tasker.subscribe();
    tasker.open(hello.conversation_id);
    assert_eq!(wait_for_update(&mut rx).await, 1);

    tasker.send_message("Sure, tomorrow at 9").await.unwrap();
    assert_eq!(wait_for_update(&mut rx).await, 2);

    let snapshot = tasker.snapshot();
    assert_eq!(snapshot.messages[0].sender_id, CUSTOMER);
    assert_eq!(snapshot.messages[1].sender_id, TASKER);

    assert!(tasker.mark_read(hello.id).await.unwrap());
    assert!(!tasker.mark_read(hello.id).await.unwrap());

    let summaries = SyncBackend::list_conversations(service.as_ref(), CUSTOMER).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].other_user_id, TASKER);
}

#[tokio::test]
async fn outsider_cannot_follow_a_conversation() {
    let service = service();
    let hello = service
        .send_direct_message(CUSTOMER, TASKER, "hi")
        .await
        .unwrap();

    let mut outsider = ConversationSync::new(service.clone(), UserId(99), config());
    let mut rx = outsider.subscribe();
    outsider.open(hello.conversation_id);

    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Ok(SyncEvent::RefreshFailed { .. })) => {}
        other => panic!("expected a failed refresh, got {other:?}"),
    }
    assert!(outsider.snapshot().messages.is_empty());

    let err = outsider.send_message("let me in").await.unwrap_err();
    assert!(matches!(err, TasklinkError::Forbidden(_)));
}
