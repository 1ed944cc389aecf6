use crate::api::ErrorResponse;
use crate::auth::{delete_session, token_from_headers, AuthUser};
use crate::db::DbPool;
use crate::error::ApiError;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/auth/token/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn logout(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = token_from_headers(&headers)
        .ok()
        .flatten()
        .ok_or(ApiError::Unauthorized("Invalid Authorization header"))?;

    let mut conn = pool.get()?;
    delete_session(&mut conn, token)?;

    tracing::info!(user_id = user.id, "user logged out");

    Ok(StatusCode::NO_CONTENT)
}
