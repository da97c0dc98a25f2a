use serde::Serialize;
use tasklink_shared::types::ConversationId;

/// Notifications published by [`ConversationSync`](crate::ConversationSync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// The open conversation's snapshot changed.
    MessagesUpdated {
        conversation_id: ConversationId,
        count: usize,
    },
    /// A refresh failed or timed out; the previous snapshot is kept.
    RefreshFailed {
        conversation_id: ConversationId,
        error: String,
    },
    Closed {
        conversation_id: ConversationId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_for_ui() {
        let json = serde_json::to_value(SyncEvent::Closed {
            conversation_id: ConversationId(4),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "event": "closed", "conversation_id": 4 }));
    }
}
