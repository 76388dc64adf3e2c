use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// Resolves `Authorization: Bearer <token>` to the calling user.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("malformed authorization header".to_string()))?;

        let user_id = state
            .sessions
            .get(token)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::Unauthenticated("unknown or expired token".to_string()))?;

        let user = state
            .users
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Unauthenticated("session user no longer exists".to_string()))?;

        Ok(AuthUser(user))
    }
}
