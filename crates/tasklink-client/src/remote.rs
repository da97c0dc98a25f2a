//! HTTP client for `tasklink-server`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use tasklink_shared::constants::ACTING_USER_HEADER;
use tasklink_shared::conversation::{ConversationSummary, Message};
use tasklink_shared::directory::DirectoryEntry;
use tasklink_shared::protocol::{Ack, ApiResponse, DirectMessageBody, SendMessageBody, SendRequestBody};
use tasklink_shared::relationship::{Connection, ConnectionEntry, PendingRequest, RelationshipStatus};
use tasklink_shared::types::{ConnectionId, ConversationId, MessageId, UserId};
use tasklink_shared::{Result, TasklinkError};

use crate::backend::SyncBackend;

/// Talks to a Tasklink server on behalf of whichever user each call names.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TasklinkError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- connections ----

    pub async fn send_request(&self, requester: UserId, receiver: UserId) -> Result<Connection> {
        let body = SendRequestBody { receiver_id: receiver };
        self.send(self.post(requester, "/connections").json(&body)).await
    }

    pub async fn accept(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.transition(id, acting, "accept").await
    }

    pub async fn reject(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.transition(id, acting, "reject").await
    }

    pub async fn cancel(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.transition(id, acting, "cancel").await
    }

    pub async fn remove(&self, id: ConnectionId, acting: UserId) -> Result<Connection> {
        self.transition(id, acting, "remove").await
    }

    pub async fn block(&self, target: UserId, acting: UserId) -> Result<Connection> {
        self.send(self.post(acting, &format!("/blocks/{target}"))).await
    }

    pub async fn get_status(&self, viewer: UserId, other: UserId) -> Result<RelationshipStatus> {
        self.send(self.get(viewer, &format!("/connections/status/{other}"))).await
    }

    pub async fn list_connections(&self, user: UserId) -> Result<Vec<ConnectionEntry>> {
        self.send(self.get(user, "/connections")).await
    }

    pub async fn list_pending_requests(&self, user: UserId) -> Result<Vec<PendingRequest>> {
        self.send(self.get(user, "/connections/pending")).await
    }

    pub async fn directory_view(&self, viewer: UserId, candidates: &[UserId]) -> Result<Vec<DirectoryEntry>> {
        let list = candidates
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.send(self.get(viewer, "/directory").query(&[("candidates", list)]))
            .await
    }

    // ---- messaging ----

    pub async fn send_direct_message(&self, sender: UserId, recipient: UserId, content: &str) -> Result<Message> {
        let body = DirectMessageBody {
            recipient_id: recipient,
            content: content.to_string(),
        };
        self.send(self.post(sender, "/direct-messages").json(&body)).await
    }

    // ---- plumbing ----

    async fn transition(&self, id: ConnectionId, acting: UserId, action: &str) -> Result<Connection> {
        self.send(self.post(acting, &format!("/connections/{id}/{action}"))).await
    }

    fn get(&self, acting: UserId, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .header(ACTING_USER_HEADER, acting.to_string())
    }

    fn post(&self, acting: UserId, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header(ACTING_USER_HEADER, acting.to_string())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(%status, url = %response.url(), "Server response");

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TasklinkError::Unavailable(format!("unreadable response ({status}): {e}")))?;
        envelope.into_result()
    }
}

fn transport_error(e: reqwest::Error) -> TasklinkError {
    if e.is_timeout() {
        TasklinkError::Unavailable("server did not respond in time".into())
    } else {
        TasklinkError::Unavailable(format!("server unreachable: {e}"))
    }
}

#[async_trait::async_trait]
impl SyncBackend for HttpBackend {
    async fn list_conversations(&self, viewer: UserId) -> Result<Vec<ConversationSummary>> {
        self.send(self.get(viewer, "/conversations")).await
    }

    async fn load_messages(&self, viewer: UserId, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.send(self.get(viewer, &format!("/conversations/{conversation_id}/messages")))
            .await
    }

    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message> {
        let body = SendMessageBody {
            content: content.to_string(),
        };
        self.send(
            self.post(sender, &format!("/conversations/{conversation_id}/messages"))
                .json(&body),
        )
        .await
    }

    async fn mark_read(&self, acting: UserId, message_id: MessageId) -> Result<bool> {
        let ack: Ack = self
            .send(self.post(acting, &format!("/messages/{message_id}/read")))
            .await?;
        Ok(ack.changed)
    }
}
