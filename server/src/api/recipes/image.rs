use crate::api::ErrorResponse;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::schema::recipes;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/recipes/{id}/image",
    tag = "recipes",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    responses(
        (status = 200, description = "Recipe image", body = Vec<u8>, content_type = "image/*"),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    )
)]
pub async fn get_recipe_image(
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let (content_type, data): (String, Vec<u8>) = recipes::table
        .find(id)
        .select((recipes::image_content_type, recipes::image_data))
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::NotFound("Recipe"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        data,
    ))
}
