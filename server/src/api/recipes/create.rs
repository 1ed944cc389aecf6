use super::payload::{load_known_ids, read_payload, replace_links, RecipeWriteRequest};
use super::read::{recipe_response, RecipeResponse};
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewRecipe, Recipe};
use crate::schema::recipes;
use crate::validation::FieldErrors;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/recipes",
    tag = "recipes",
    request_body = RecipeWriteRequest,
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Validation failed", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn create_recipe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = read_payload(payload)?;

    let mut conn = pool.get()?;

    let known = load_known_ids(&mut conn, &request)?;
    let valid = request.validate(&known, true)?;
    let image = valid
        .image
        .as_ref()
        .ok_or_else(|| ApiError::Internal("validated recipe has no image".to_string()))?;

    let recipe: Recipe = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let recipe: Recipe = diesel::insert_into(recipes::table)
            .values(NewRecipe {
                author_id: user.id,
                name: &valid.name,
                text: &valid.text,
                image_content_type: &image.content_type,
                image_data: &image.data,
                cooking_time: valid.cooking_time,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;

        replace_links(conn, recipe.id, &valid)?;

        Ok(recipe)
    })?;

    tracing::info!(
        recipe_id = recipe.id,
        user_id = user.id,
        ingredients = valid.ingredients.len(),
        tags = valid.tag_ids.len(),
        "created recipe"
    );

    let response = recipe_response(&mut conn, Some(user.id), recipe)?;

    Ok((StatusCode::CREATED, Json(response)))
}
