use super::{user_responses, UserResponse};
use crate::api::ListParams;
use crate::auth::MaybeUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::User;
use crate::schema::users;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(ListParams),
    responses(
        (status = 200, description = "Users ordered by id", body = Vec<UserResponse>)
    )
)]
pub async fn list_users(
    viewer: MaybeUser,
    State(pool): State<Arc<DbPool>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let rows: Vec<User> = users::table
        .order(users::id.asc())
        .limit(params.limit())
        .offset(params.offset())
        .select(User::as_select())
        .load(&mut conn)?;

    Ok(Json(user_responses(&mut conn, viewer.id(), rows)?))
}
