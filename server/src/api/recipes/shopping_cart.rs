use super::read::{find_recipe, ShortRecipeResponse};
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::NewShoppingCartItem;
use crate::queries::recipe_exists;
use crate::schema::{ingredient_amounts, ingredients, shopping_carts};
use crate::validation::FieldErrors;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use diesel::dsl::sum;
use diesel::prelude::*;
use std::fmt::Write;
use std::sync::Arc;

pub const ALREADY_IN_CART: &str = "Recipe is already in the shopping cart.";
pub const NOT_IN_CART: &str = "Recipe is not in the shopping cart.";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// One aggregated line of the shopping list
#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart",
    tag = "shopping_cart",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to the shopping cart", body = ShortRecipeResponse),
        (status = 400, description = "Already in the shopping cart", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn add_to_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let recipe = find_recipe(&mut conn, id)?;

    diesel::insert_into(shopping_carts::table)
        .values(NewShoppingCartItem {
            user_id: user.id,
            recipe_id: recipe.id,
        })
        .execute(&mut conn)
        .map_err(|e| ApiError::on_unique_violation(e, "errors", ALREADY_IN_CART))?;

    tracing::debug!(recipe_id = recipe.id, user_id = user.id, "added recipe to cart");

    Ok((StatusCode::CREATED, Json(ShortRecipeResponse::from(&recipe))))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart",
    tag = "shopping_cart",
    params(
        ("id" = i64, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from the shopping cart"),
        (status = 400, description = "Not in the shopping cart", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn remove_from_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = pool.get()?;

    if !recipe_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Recipe"));
    }

    let deleted = diesel::delete(
        shopping_carts::table
            .filter(shopping_carts::user_id.eq(user.id))
            .filter(shopping_carts::recipe_id.eq(id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::field("errors", NOT_IN_CART));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Sum ingredient amounts over every recipe in the user's cart, grouped by
/// ingredient name and unit.
pub fn shopping_list(conn: &mut PgConnection, user_id: i64) -> QueryResult<Vec<ShoppingListItem>> {
    let rows: Vec<(String, String, Option<i64>)> = shopping_carts::table
        .inner_join(
            ingredient_amounts::table
                .on(ingredient_amounts::recipe_id.eq(shopping_carts::recipe_id)),
        )
        .inner_join(ingredients::table.on(ingredients::id.eq(ingredient_amounts::ingredient_id)))
        .filter(shopping_carts::user_id.eq(user_id))
        .group_by((ingredients::name, ingredients::measurement_unit))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            sum(ingredient_amounts::amount),
        ))
        .order((ingredients::name.asc(), ingredients::measurement_unit.asc()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(name, measurement_unit, total)| ShoppingListItem {
            name,
            measurement_unit,
            total: total.unwrap_or(0),
        })
        .collect())
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    for item in items {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "- {} ({}) — {}",
            item.name, item.measurement_unit, item.total
        );
    }
    out
}

#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    tag = "shopping_cart",
    responses(
        (status = 200, description = "Shopping list as a text attachment", body = String, content_type = "text/plain"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn download_shopping_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let items = shopping_list(&mut conn, user.id)?;

    tracing::info!(user_id = user.id, lines = items.len(), "rendered shopping list");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME),
            ),
        ],
        render_shopping_list(&items),
    ))
}
