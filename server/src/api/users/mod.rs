pub mod create;
pub mod get;
pub mod list;
pub mod me;
pub mod set_password;
pub mod subscribe;
pub mod subscriptions;

use crate::models::User;
use crate::queries::subscribed_author_ids;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

/// Public profile of a user as seen by the requesting user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the requesting user is subscribed to this user
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// Build profiles for `users`, resolving `is_subscribed` for `viewer` in one query.
pub fn user_responses(
    conn: &mut PgConnection,
    viewer: Option<i64>,
    users: Vec<User>,
) -> QueryResult<Vec<UserResponse>> {
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    let subscribed = subscribed_author_ids(conn, viewer, &ids)?;

    Ok(users
        .into_iter()
        .map(|user| {
            let is_subscribed = subscribed.contains(&user.id);
            UserResponse::new(user, is_subscribed)
        })
        .collect())
}

/// Returns the router for /api/users endpoints (mounted at /api/users)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_users).post(create::create_user))
        .route("/me", get(me::me))
        .route("/set_password", post(set_password::set_password))
        .route("/subscriptions", get(subscriptions::list_subscriptions))
        .route("/{id}", get(get::get_user))
        .route(
            "/{id}/subscribe",
            post(subscribe::subscribe).delete(subscribe::unsubscribe),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create::create_user,
        list::list_users,
        get::get_user,
        me::me,
        set_password::set_password,
        subscriptions::list_subscriptions,
        subscribe::subscribe,
        subscribe::unsubscribe,
    ),
    components(schemas(
        UserResponse,
        create::CreateUserRequest,
        create::CreateUserResponse,
        set_password::SetPasswordRequest,
        subscriptions::SubscriptionResponse,
    ))
)]
pub struct ApiDoc;
