use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;

use crate::api::server::RouteError;
use crate::db::models::user::UserId;

/// Header carrying the authenticated user id, injected by the upstream auth
/// proxy. Authentication itself happens there; this service only trusts the
/// header.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the caller's identity. Missing or malformed header => 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = RouteError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(RouteError::Auth(StatusCode::UNAUTHORIZED))?
            .to_str()
            .map_err(|_| RouteError::Auth(StatusCode::UNAUTHORIZED))?;

        let id = raw
            .parse::<i64>()
            .map_err(|_| RouteError::Auth(StatusCode::UNAUTHORIZED))?;

        Ok(AuthedUser(UserId(id)))
    }
}
