use super::subscriptions::{subscription_responses, SubscriptionResponse};
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewSubscription, User};
use crate::schema::{subscriptions, users};
use crate::validation::FieldErrors;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

pub const SELF_SUBSCRIPTION: &str = "You cannot subscribe to yourself.";
pub const ALREADY_SUBSCRIBED: &str = "You are already subscribed to this user.";
pub const NOT_SUBSCRIBED: &str = "You are not subscribed to this user.";

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubscribeParams {
    /// Maximum number of recipes shown for the author
    pub recipes_limit: Option<usize>,
}

fn subscription_error(message: &str) -> ApiError {
    ApiError::field("errors", message)
}

/// Users may follow anyone but themselves.
pub fn check_subscription_target(user_id: i64, author_id: i64) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(subscription_error(SELF_SUBSCRIPTION));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(
        ("id" = i64, Path, description = "Author ID"),
        SubscribeParams
    ),
    responses(
        (status = 201, description = "Subscribed", body = SubscriptionResponse),
        (status = 400, description = "Self or duplicate subscription", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Author not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn subscribe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(author_id): Path<i64>,
    Query(params): Query<SubscribeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let author: User = users::table
        .find(author_id)
        .select(User::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::NotFound("User"))?;

    check_subscription_target(user.id, author.id)?;

    // A concurrent duplicate trips the unique constraint instead of a pre-check
    diesel::insert_into(subscriptions::table)
        .values(&NewSubscription {
            user_id: user.id,
            author_id: author.id,
        })
        .execute(&mut conn)
        .map_err(|e| ApiError::on_unique_violation(e, "errors", ALREADY_SUBSCRIBED))?;

    tracing::info!(user_id = user.id, author_id = author.id, "subscribed");

    let response = subscription_responses(&mut conn, vec![author], params.recipes_limit)?
        .pop()
        .ok_or_else(|| ApiError::Internal("subscription response missing".to_string()))?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(
        ("id" = i64, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Not subscribed", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Author not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn unsubscribe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(author_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = pool.get()?;

    let author_exists: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::id.eq(author_id)),
    ))
    .get_result(&mut conn)?;
    if !author_exists {
        return Err(ApiError::NotFound("User"));
    }

    let deleted = diesel::delete(
        subscriptions::table
            .filter(subscriptions::user_id.eq(user.id))
            .filter(subscriptions::author_id.eq(author_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(subscription_error(NOT_SUBSCRIBED));
    }

    tracing::info!(user_id = user.id, author_id, "unsubscribed");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_subscribe_to_self() {
        match check_subscription_target(7, 7) {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors.get("errors").unwrap(), [SELF_SUBSCRIPTION]);
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn can_subscribe_to_someone_else() {
        assert!(check_subscription_target(7, 8).is_ok());
    }
}
