//! Resolves the acting user from the trusted identity header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tasklink_shared::constants::ACTING_USER_HEADER;
use tasklink_shared::types::UserId;

use crate::error::ServerError;

/// The authenticated caller, as asserted by the fronting auth layer.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        acting_user(&parts.headers)
            .map(ActingUser)
            .ok_or(ServerError::Unauthenticated)
    }
}

pub fn acting_user(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(ACTING_USER_HEADER)?
        .to_str()
        .ok()?
        .parse::<UserId>()
        .ok()
        .filter(|id| id.get() > 0)
}
