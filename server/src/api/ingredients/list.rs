use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::Ingredient;
use crate::schema::ingredients;
use axum::{extract::State, response::IntoResponse, Json};
use diesel::prelude::*;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/ingredients",
    tag = "ingredients",
    responses(
        (status = 200, description = "All ingredients ordered by id", body = Vec<Ingredient>)
    )
)]
pub async fn list_ingredients(
    State(pool): State<Arc<DbPool>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let rows: Vec<Ingredient> = ingredients::table
        .order(ingredients::id.asc())
        .select(Ingredient::as_select())
        .load(&mut conn)?;

    Ok(Json(rows))
}
