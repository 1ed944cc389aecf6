use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::Tag;
use crate::schema::tags;
use axum::{extract::State, response::IntoResponse, Json};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "tags",
    responses(
        (status = 200, description = "All tags ordered by name", body = Vec<Tag>)
    )
)]
pub async fn list_tags(State(pool): State<Arc<DbPool>>) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let rows: Vec<Tag> = tags::table
        .order(tags::name.asc())
        .select(Tag::as_select())
        .load(&mut conn)?;

    Ok(Json(rows))
}
