use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tasklink_shared::constants::ACTING_USER_HEADER;
use tasklink_shared::protocol::{ApiResponse, ErrorBody};
use tasklink_shared::{ErrorKind, TasklinkError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] TasklinkError),

    #[error("Missing or invalid {} header", ACTING_USER_HEADER)]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl ServerError {
    fn status_and_kind(&self) -> (StatusCode, ErrorKind) {
        match self {
            ServerError::Core(e) => {
                let status = match e {
                    TasklinkError::Validation(_) => StatusCode::BAD_REQUEST,
                    TasklinkError::Forbidden(_) => StatusCode::FORBIDDEN,
                    TasklinkError::NotFound(_) => StatusCode::NOT_FOUND,
                    TasklinkError::InvalidState(_) => StatusCode::CONFLICT,
                    TasklinkError::Blocked => StatusCode::LOCKED,
                    TasklinkError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.kind())
            }
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, ErrorKind::Forbidden),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, ErrorKind::Unavailable),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let message = match &self {
            ServerError::Core(TasklinkError::Unavailable(detail)) => {
                tracing::warn!(%detail, "Request failed on an unavailable dependency");
                "Service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body: ApiResponse<()> = ApiResponse::Error {
            error: ErrorBody { kind, message },
        };

        (status, Json(body)).into_response()
    }
}
