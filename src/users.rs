use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::AppState;

/// Identity attached to write requests. Until real auth lands, the id comes
/// from the `X-User-Id` header, falling back to the configured default user.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match parts.headers.get("x-user-id") {
            None => Ok(Self(state.config.default_user_id)),
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ServiceError::Unauthorized("Invalid X-User-Id header".into()))?;
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| ServiceError::Unauthorized("Invalid X-User-Id header".into()))
            }
        }
    }
}
