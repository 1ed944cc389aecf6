use crate::auth::{create_session, verify_password};
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::User;
use crate::schema::users;
use crate::validation::{required_text, FieldErrors, NON_FIELD_ERRORS};
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub auth_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/token/login",
    tag = "auth",
    request_body(content = LoginRequest, example = json!({"email": "cook@example.com", "password": "password"})),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = FieldErrors)
    )
)]
pub async fn login(
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let mut errors = FieldErrors::new();
    let email = required_text(&mut errors, "email", req.email.as_deref(), None);
    // Passwords are compared untrimmed
    let password =
        required_text(&mut errors, "password", req.password.as_deref(), None).and(req.password.as_deref());
    errors.into_result()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    };

    let mut conn = pool.get()?;

    let user: Option<User> = users::table
        .filter(users::email.eq(email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .optional()?;

    let user = match user {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => return Err(ApiError::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS)),
    };

    let auth_token = create_session(&mut conn, user.id)?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok((StatusCode::OK, Json(LoginResponse { auth_token })))
}
