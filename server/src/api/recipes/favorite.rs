use super::read::{find_recipe, ShortRecipeResponse};
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::NewFavoriteRecipe;
use crate::queries::recipe_exists;
use crate::schema::favorite_recipes;
use crate::validation::FieldErrors;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;

pub const ALREADY_FAVORITED: &str = "Recipe is already in favorites.";
pub const NOT_FAVORITED: &str = "Recipe is not in favorites.";

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite",
    tag = "favorites",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to favorites", body = ShortRecipeResponse),
        (status = 400, description = "Already in favorites", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn add_favorite(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let recipe = find_recipe(&mut conn, id)?;

    diesel::insert_into(favorite_recipes::table)
        .values(NewFavoriteRecipe {
            user_id: user.id,
            recipe_id: recipe.id,
        })
        .execute(&mut conn)
        .map_err(|e| ApiError::on_unique_violation(e, "errors", ALREADY_FAVORITED))?;

    tracing::debug!(recipe_id = recipe.id, user_id = user.id, "added favorite");

    Ok((StatusCode::CREATED, Json(ShortRecipeResponse::from(&recipe))))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite",
    tag = "favorites",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from favorites"),
        (status = 400, description = "Not in favorites", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn remove_favorite(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = pool.get()?;

    if !recipe_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Recipe"));
    }

    let deleted = diesel::delete(
        favorite_recipes::table
            .filter(favorite_recipes::user_id.eq(user.id))
            .filter(favorite_recipes::recipe_id.eq(id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::field("errors", NOT_FAVORITED));
    }

    Ok(StatusCode::NO_CONTENT)
}
