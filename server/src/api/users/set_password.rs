use crate::api::ErrorResponse;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::db::DbPool;
use crate::error::ApiError;
use crate::schema::users;
use crate::validation::{FieldErrors, BLANK, REQUIRED};
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

pub const SAME_PASSWORD: &str = "The new password must differ from the current one.";
pub const WRONG_PASSWORD: &str = "Invalid password.";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

impl SetPasswordRequest {
    /// Field checks that need no database: presence and difference.
    /// Returns `(current, new)` on success.
    pub fn validate(&self) -> Result<(&str, &str), FieldErrors> {
        let mut errors = FieldErrors::new();

        let has_current = check_present(&mut errors, "current_password", &self.current_password);
        let has_new = check_present(&mut errors, "new_password", &self.new_password);

        match (has_current, has_new, &self.current_password, &self.new_password) {
            (true, true, Some(current), Some(new)) => {
                if current == new {
                    return Err(FieldErrors::single("new_password", SAME_PASSWORD));
                }
                Ok((current.as_str(), new.as_str()))
            }
            _ => Err(errors),
        }
    }
}

fn check_present(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> bool {
    match value.as_deref() {
        None => errors.add(field, REQUIRED),
        Some(v) if v.trim().is_empty() => errors.add(field, BLANK),
        Some(_) => return true,
    }
    false
}

#[utoipa::path(
    post,
    path = "/api/users/set_password",
    tag = "users",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid request", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn set_password(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let (current, new) = request.validate()?;

    if !verify_password(current, &user.password_hash) {
        return Err(ApiError::field("current_password", WRONG_PASSWORD));
    }

    let password_hash = hash_password(new)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?;

    let mut conn = pool.get()?;
    diesel::update(users::table.find(user.id))
        .set(users::password_hash.eq(&password_hash))
        .execute(&mut conn)?;

    tracing::info!(user_id = user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}
