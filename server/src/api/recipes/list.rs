use super::read::{recipe_responses, RecipeResponse};
use crate::api::ListParams;
use crate::auth::MaybeUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::Recipe;
use crate::schema::recipes;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/recipes",
    tag = "recipes",
    params(ListParams),
    responses(
        (status = 200, description = "Recipes, newest first", body = Vec<RecipeResponse>)
    )
)]
pub async fn list_recipes(
    viewer: MaybeUser,
    State(pool): State<Arc<DbPool>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let rows: Vec<Recipe> = recipes::table
        .order((recipes::pub_date.desc(), recipes::id.desc()))
        .limit(params.limit())
        .offset(params.offset())
        .select(Recipe::as_select())
        .load(&mut conn)?;

    Ok(Json(recipe_responses(&mut conn, viewer.id(), rows)?))
}
