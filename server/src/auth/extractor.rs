use crate::api::ErrorResponse;
use crate::db::DbPool;
use crate::models::User;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::db::get_user_from_token;

/// Extractor that validates the Authorization header and provides the authenticated user.
///
/// Accepts `Token <hex>` and `Bearer <hex>` schemes.
pub struct AuthUser(pub User);

/// Like [`AuthUser`], but a request without an Authorization header is anonymous
/// instead of rejected. A header that is present but invalid is still a 401.
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingHeader,
    InvalidHeader,
    InvalidFormat,
    InvalidToken,
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided",
            ),
            AuthError::InvalidHeader => (StatusCode::UNAUTHORIZED, "Invalid Authorization header"),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format",
            ),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database connection failed",
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

/// Pull the raw token out of the Authorization header.
/// `Ok(None)` means the header is absent.
pub fn token_from_headers(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidHeader)?;

    let token = auth_str
        .strip_prefix("Token ")
        .or_else(|| auth_str.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)?;

    Ok(Some(token))
}

fn resolve_user(pool: &DbPool, token: &str) -> Result<User, AuthError> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "database connection failed during authentication");
        AuthError::Unavailable
    })?;

    match get_user_from_token(&mut conn, token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(AuthError::InvalidToken),
        Err(e) => {
            tracing::error!(error = %e, "failed to look up session");
            Err(AuthError::Unavailable)
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<DbPool>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = Arc::<DbPool>::from_ref(state);

        let token = token_from_headers(&parts.headers)?.ok_or(AuthError::MissingHeader)?;
        let user = resolve_user(&pool, token)?;

        Ok(AuthUser(user))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Arc<DbPool>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers)? else {
            return Ok(MaybeUser(None));
        };

        let pool = Arc::<DbPool>::from_ref(state);
        let user = resolve_user(&pool, token)?;

        Ok(MaybeUser(Some(user)))
    }
}
