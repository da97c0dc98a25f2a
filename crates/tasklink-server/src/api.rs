use std::sync::Arc;

use axum::{
    extract::State,
    http::Method,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use tasklink_core::{
    ConnectionGraphService, ConversationService, CoreConfig, RelationshipAwareDirectoryView,
    SqliteBackend, UserDirectoryCache,
};
use tasklink_shared::conversation::{ConversationSummary, Message};
use tasklink_shared::directory::DirectoryEntry;
use tasklink_shared::protocol::{Ack, ApiResponse, DirectMessageBody, SendMessageBody, SendRequestBody};
use tasklink_shared::relationship::{Connection, ConnectionEntry, PendingRequest, RelationshipStatus};
use tasklink_shared::types::{ConnectionId, ConversationId, MessageId, UserId};

use crate::error::ServerError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::identity::ActingUser;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

/// Upper bound on candidates accepted by one directory request.
const MAX_DIRECTORY_CANDIDATES: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<ConnectionGraphService>,
    pub conversations: Arc<ConversationService>,
    pub profiles: Arc<UserDirectoryCache>,
    pub directory: Arc<RelationshipAwareDirectoryView>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire every service to one SQLite backend.
    pub fn new(backend: SqliteBackend, core: &CoreConfig, rate_limiter: RateLimiter) -> Self {
        let backend = Arc::new(backend);
        let graph = Arc::new(ConnectionGraphService::new(backend.clone(), core));
        let conversations = Arc::new(ConversationService::new(backend.clone(), core));
        let profiles = Arc::new(UserDirectoryCache::new(backend, core));
        let directory = Arc::new(
            RelationshipAwareDirectoryView::new(graph.clone(), core).with_profiles(profiles.clone()),
        );

        Self {
            graph,
            conversations,
            profiles,
            directory,
            rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/connections", get(list_connections).post(send_request))
        .route("/connections/pending", get(list_pending_requests))
        .route("/connections/status/:other_id", get(get_status))
        .route("/connections/:id/accept", post(accept_request))
        .route("/connections/:id/reject", post(reject_request))
        .route("/connections/:id/cancel", post(cancel_request))
        .route("/connections/:id/remove", post(remove_connection))
        .route("/blocks/:target_id", post(block_user))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/:id/messages",
            get(load_messages).post(send_message),
        )
        .route("/direct-messages", post(send_direct_message))
        .route("/messages/:id/read", post(mark_read))
        .route("/directory", get(directory_view))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ServerError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct DirectoryQuery {
    #[serde(default)]
    candidates: String,
}

async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

// ---- connections ----

async fn send_request(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiJson(body): ApiJson<SendRequestBody>,
) -> ApiResult<Connection> {
    ok(state.graph.send_request(acting, body.receiver_id).await?)
}

async fn accept_request(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(id): ApiPath<ConnectionId>,
) -> ApiResult<Connection> {
    ok(state.graph.accept(id, acting).await?)
}

async fn reject_request(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(id): ApiPath<ConnectionId>,
) -> ApiResult<Connection> {
    ok(state.graph.reject(id, acting).await?)
}

async fn cancel_request(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(id): ApiPath<ConnectionId>,
) -> ApiResult<Connection> {
    ok(state.graph.cancel(id, acting).await?)
}

async fn remove_connection(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(id): ApiPath<ConnectionId>,
) -> ApiResult<Connection> {
    ok(state.graph.remove(id, acting).await?)
}

async fn block_user(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(target): ApiPath<UserId>,
) -> ApiResult<Connection> {
    ok(state.graph.block(target, acting).await?)
}

async fn get_status(
    State(state): State<AppState>,
    ActingUser(viewer): ActingUser,
    ApiPath(other): ApiPath<UserId>,
) -> ApiResult<RelationshipStatus> {
    ok(state.graph.get_status(viewer, other).await?)
}

async fn list_connections(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> ApiResult<Vec<ConnectionEntry>> {
    ok(state.graph.list_connections(user).await?)
}

async fn list_pending_requests(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> ApiResult<Vec<PendingRequest>> {
    ok(state.graph.list_pending_requests(user).await?)
}

// ---- conversations ----

async fn list_conversations(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> ApiResult<Vec<ConversationSummary>> {
    ok(state.conversations.list_conversations(user).await?)
}

async fn load_messages(
    State(state): State<AppState>,
    ActingUser(viewer): ActingUser,
    ApiPath(id): ApiPath<ConversationId>,
) -> ApiResult<Vec<Message>> {
    ok(state.conversations.load_messages_as(viewer, id).await?)
}

async fn send_message(
    State(state): State<AppState>,
    ActingUser(sender): ActingUser,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(body): ApiJson<SendMessageBody>,
) -> ApiResult<Message> {
    ok(state.conversations.send_message(id, sender, &body.content).await?)
}

async fn send_direct_message(
    State(state): State<AppState>,
    ActingUser(sender): ActingUser,
    ApiJson(body): ApiJson<DirectMessageBody>,
) -> ApiResult<Message> {
    ok(state
        .conversations
        .send_direct_message(sender, body.recipient_id, &body.content)
        .await?)
}

async fn mark_read(
    State(state): State<AppState>,
    ActingUser(acting): ActingUser,
    ApiPath(id): ApiPath<MessageId>,
) -> ApiResult<Ack> {
    let changed = state.conversations.mark_read(id, acting).await?;
    ok(Ack { changed })
}

// ---- directory ----

async fn directory_view(
    State(state): State<AppState>,
    ActingUser(viewer): ActingUser,
    ApiQuery(query): ApiQuery<DirectoryQuery>,
) -> ApiResult<Vec<DirectoryEntry>> {
    let candidates = parse_candidates(&query.candidates)?;
    ok(state.directory.build_view(viewer, &candidates).await)
}

fn parse_candidates(raw: &str) -> Result<Vec<UserId>, ServerError> {
    let candidates = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UserId>()
                .map_err(|_| ServerError::BadRequest(format!("invalid user id {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if candidates.len() > MAX_DIRECTORY_CANDIDATES {
        return Err(ServerError::BadRequest(format!(
            "at most {MAX_DIRECTORY_CANDIDATES} candidates per request"
        )));
    }
    Ok(candidates)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tasklink_shared::constants::ACTING_USER_HEADER;
    use tasklink_shared::directory::DirectoryProfile;
    use tasklink_shared::relationship::{ConnectionStatus, Perspective, ResolvedStatus};
    use tasklink_shared::{ErrorKind, TasklinkError};
    use tower::ServiceExt;

    use super::*;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        for (id, first) in [(2, "Bea"), (3, "Cal")] {
            backend
                .with_db(|db| {
                    db.upsert_profile(&DirectoryProfile {
                        user_id: UserId(id),
                        first_name: first.into(),
                        last_name: "Tasker".into(),
                        avatar_url: None,
                        location: Some("Austin".into()),
                        skills: vec!["plumbing".into()],
                    })
                })
                .unwrap();
        }
        backend
    }

    fn app_with(limiter: RateLimiter) -> Router {
        build_router(AppState::new(backend(), &CoreConfig::default(), limiter))
    }

    fn app() -> Router {
        app_with(RateLimiter::default())
    }

    fn request(method: &str, uri: &str, user: Option<i64>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(ACTING_USER_HEADER, user.to_string());
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call<T: DeserializeOwned>(app: &Router, req: Request<Body>) -> (StatusCode, ApiResponse<T>) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn data<T>(resp: ApiResponse<T>) -> T {
        match resp.into_result() {
            Ok(data) => data,
            Err(e) => panic!("expected ok envelope, got {e}"),
        }
    }

    fn error_kind<T>(resp: ApiResponse<T>) -> ErrorKind {
        match resp {
            ApiResponse::Error { error } => error.kind,
            ApiResponse::Ok { .. } => panic!("expected error envelope"),
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let (status, resp) = call::<Value>(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data(resp)["status"], "ok");
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let app = app();
        let (status, resp) = call::<Value>(&app, request("GET", "/connections", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_kind(resp), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn request_accept_flow() {
        let app = app();

        let (status, resp) = call::<Connection>(
            &app,
            request("POST", "/connections", Some(1), Some(json!({ "receiver_id": 2 }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let connection = data(resp);
        assert_eq!(connection.status, ConnectionStatus::Pending);

        let accept = format!("/connections/{}/accept", connection.id);
        let (status, resp) = call::<Connection>(&app, request("POST", &accept, Some(1), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_kind(resp), ErrorKind::Forbidden);

        let (status, resp) = call::<Connection>(&app, request("POST", &accept, Some(2), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data(resp).status, ConnectionStatus::Accepted);

        let (_, resp) = call::<RelationshipStatus>(
            &app,
            request("GET", "/connections/status/2", Some(1), None),
        )
        .await;
        let rel = data(resp);
        assert_eq!(rel.status, ResolvedStatus::Accepted);
        assert!(rel.is_requester);

        let (status, resp) = call::<Connection>(&app, request("POST", &accept, Some(2), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_kind(resp), ErrorKind::InvalidState);

        let (_, resp) = call::<Vec<ConnectionEntry>>(&app, request("GET", "/connections", Some(2), None)).await;
        assert_eq!(data(resp)[0].other_user_id, UserId(1));
    }

    #[tokio::test]
    async fn block_prevents_new_requests() {
        let app = app();

        let (status, _) = call::<Connection>(&app, request("POST", "/blocks/1", Some(2), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, resp) = call::<Connection>(
            &app,
            request("POST", "/connections", Some(1), Some(json!({ "receiver_id": 2 }))),
        )
        .await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(resp.into_result().unwrap_err(), TasklinkError::Blocked);
    }

    #[tokio::test]
    async fn messaging_round() {
        let app = app();

        let (status, resp) = call::<Message>(
            &app,
            request(
                "POST",
                "/direct-messages",
                Some(1),
                Some(json!({ "recipient_id": 2, "content": " Hello " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let hello = data(resp);
        assert_eq!(hello.content, " Hello ");

        let messages_uri = format!("/conversations/{}/messages", hello.conversation_id);
        let (_, resp) = call::<Vec<Message>>(&app, request("GET", &messages_uri, Some(2), None)).await;
        assert_eq!(data(resp).len(), 1);

        let (status, _) = call::<Vec<Message>>(&app, request("GET", &messages_uri, Some(3), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let read_uri = format!("/messages/{}/read", hello.id);
        let (_, resp) = call::<Ack>(&app, request("POST", &read_uri, Some(2), None)).await;
        assert!(data(resp).changed);
        let (_, resp) = call::<Ack>(&app, request("POST", &read_uri, Some(2), None)).await;
        assert!(!data(resp).changed);

        let (status, _) = call::<Ack>(&app, request("POST", &read_uri, Some(1), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, resp) = call::<Message>(
            &app,
            request("POST", &messages_uri, Some(2), Some(json!({ "content": "Hi back" }))),
        )
        .await;
        assert_eq!(data(resp).sender_id, UserId(2));

        let (_, resp) = call::<Vec<ConversationSummary>>(&app, request("GET", "/conversations", Some(1), None)).await;
        let summaries = data(resp);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].other_user_id, UserId(2));
        assert_eq!(
            summaries[0].last_message.as_ref().map(|m| m.sender_id),
            Some(UserId(2))
        );
    }

    #[tokio::test]
    async fn blank_message_is_validation_error() {
        let app = app();
        let (status, resp) = call::<Message>(
            &app,
            request(
                "POST",
                "/direct-messages",
                Some(1),
                Some(json!({ "recipient_id": 2, "content": "   " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn directory_joins_status_and_profiles() {
        let app = app();
        call::<Connection>(
            &app,
            request("POST", "/connections", Some(1), Some(json!({ "receiver_id": 3 }))),
        )
        .await;

        let (status, resp) = call::<Vec<DirectoryEntry>>(
            &app,
            request("GET", "/directory?candidates=1,2,3,2,99", Some(1), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = data(resp);

        let ids: Vec<UserId> = entries.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![UserId(2), UserId(3), UserId(99)]);
        assert_eq!(entries[0].perspective, Perspective::None);
        assert_eq!(
            entries[0].profile.as_ref().map(|p| p.first_name.as_str()),
            Some("Bea")
        );
        assert_eq!(entries[1].perspective, Perspective::Sent);
        assert!(entries[2].profile.is_none());
    }

    #[tokio::test]
    async fn directory_rejects_malformed_candidates() {
        let app = app();
        let (status, _) = call::<Value>(
            &app,
            request("GET", "/directory?candidates=2,abc", Some(1), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, resp) = call::<Value>(
            &app,
            request("GET", "/directory?candidates=2&candidates=3", Some(1), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn malformed_path_id_uses_error_envelope() {
        let app = app();
        let (status, resp) = call::<Value>(
            &app,
            request("POST", "/connections/abc/accept", Some(1), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn malformed_json_body_uses_error_envelope() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/connections")
            .header(ACTING_USER_HEADER, "1")
            .header("content-type", "application/json")
            .body(Body::from("{\"receiver_id\": "))
            .unwrap();
        let (status, resp) = call::<Value>(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);

        let (status, resp) = call::<Value>(
            &app,
            request("POST", "/direct-messages", Some(1), Some(json!({ "content": "hi" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn missing_json_content_type_uses_error_envelope() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/connections")
            .header(ACTING_USER_HEADER, "1")
            .body(Body::from(json!({ "receiver_id": 2 }).to_string()))
            .unwrap();
        let (status, resp) = call::<Value>(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(resp), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn writes_are_rate_limited_per_user() {
        let app = app_with(RateLimiter::new(0.001, 2.0));
        for receiver in [2, 3] {
            let (status, _) = call::<Connection>(
                &app,
                request("POST", "/connections", Some(1), Some(json!({ "receiver_id": receiver }))),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, resp) = call::<Connection>(
            &app,
            request("POST", "/connections", Some(1), Some(json!({ "receiver_id": 4 }))),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error_kind(resp), ErrorKind::Unavailable);

        // Reads and other users are unaffected.
        let (status, _) = call::<Vec<ConnectionEntry>>(&app, request("GET", "/connections", Some(1), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call::<Connection>(&app, request("POST", "/blocks/1", Some(5), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn parse_candidates_skips_blanks() {
        assert_eq!(
            parse_candidates(" 4, ,5,").unwrap(),
            vec![UserId(4), UserId(5)]
        );
        assert!(parse_candidates("").unwrap().is_empty());
    }
}
