use super::payload::{load_known_ids, read_payload, replace_links, RecipeWriteRequest};
use super::read::{find_recipe, recipe_response, RecipeResponse};
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{Recipe, RecipeChanges};
use crate::schema::recipes;
use crate::validation::FieldErrors;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;

pub const NOT_AUTHOR: &str = "Only the author can change this recipe";

/// Replace a recipe's fields, tags and ingredients. Served for both PUT and PATCH;
/// the image may be omitted to keep the stored one.
#[utoipa::path(
    put,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    request_body = RecipeWriteRequest,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Validation failed", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn update_recipe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let existing = find_recipe(&mut conn, id)?;
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden(NOT_AUTHOR));
    }

    let request = read_payload(payload)?;
    let known = load_known_ids(&mut conn, &request)?;
    let valid = request.validate(&known, false)?;

    let recipe: Recipe = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let recipe: Recipe = diesel::update(recipes::table.find(id))
            .set(RecipeChanges {
                name: &valid.name,
                text: &valid.text,
                cooking_time: valid.cooking_time,
                image_content_type: valid.image.as_ref().map(|i| i.content_type.as_str()),
                image_data: valid.image.as_ref().map(|i| i.data.as_slice()),
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;

        replace_links(conn, recipe.id, &valid)?;

        Ok(recipe)
    })?;

    tracing::info!(
        recipe_id = recipe.id,
        user_id = user.id,
        image_replaced = valid.image.is_some(),
        "updated recipe"
    );

    Ok(Json(recipe_response(&mut conn, Some(user.id), recipe)?))
}
