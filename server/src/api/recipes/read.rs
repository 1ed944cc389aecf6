//! Read representations of recipes and the batched loaders that build them.

use crate::api::users::{user_responses, UserResponse};
use crate::error::ApiError;
use crate::models::{Recipe, Tag, User};
use crate::queries::{carted_recipe_ids, favorited_recipe_ids};
use crate::schema::{ingredient_amounts, ingredients, recipe_tags, recipes, tags, users};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

/// An ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IngredientAmountResponse {
    /// Ingredient ID
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<IngredientAmountResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// URL of the recipe image
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Compact recipe used by favorites, the shopping cart and subscriptions
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShortRecipeResponse {
    pub id: i64,
    pub name: String,
    /// URL of the recipe image
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for ShortRecipeResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: image_url(recipe.id),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Load a recipe row or fail with 404.
pub fn find_recipe(conn: &mut PgConnection, id: i64) -> Result<Recipe, ApiError> {
    recipes::table
        .find(id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or(ApiError::NotFound("Recipe"))
}

pub fn image_url(recipe_id: i64) -> String {
    format!("/api/recipes/{}/image", recipe_id)
}

type IngredientRow = (i64, i64, String, String, i32);

/// Build full representations for `recipes`, preserving their order.
///
/// Runs a fixed number of queries regardless of how many recipes are passed.
pub fn recipe_responses(
    conn: &mut PgConnection,
    viewer: Option<i64>,
    recipes: Vec<Recipe>,
) -> QueryResult<Vec<RecipeResponse>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<i64> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: Vec<User> = users::table
        .filter(users::id.eq_any(&author_ids))
        .select(User::as_select())
        .load(conn)?;
    let authors: HashMap<i64, UserResponse> = user_responses(conn, viewer, authors)?
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    let tag_rows: Vec<(i64, Tag)> = recipe_tags::table
        .inner_join(tags::table)
        .filter(recipe_tags::recipe_id.eq_any(&recipe_ids))
        .order(tags::name.asc())
        .select((recipe_tags::recipe_id, Tag::as_select()))
        .load(conn)?;
    let mut tags_by_recipe: HashMap<i64, Vec<Tag>> = HashMap::new();
    for (recipe_id, tag) in tag_rows {
        tags_by_recipe.entry(recipe_id).or_default().push(tag);
    }

    let ingredient_rows: Vec<IngredientRow> = ingredient_amounts::table
        .inner_join(ingredients::table)
        .filter(ingredient_amounts::recipe_id.eq_any(&recipe_ids))
        .order(ingredient_amounts::id.asc())
        .select((
            ingredient_amounts::recipe_id,
            ingredients::id,
            ingredients::name,
            ingredients::measurement_unit,
            ingredient_amounts::amount,
        ))
        .load(conn)?;
    let mut ingredients_by_recipe: HashMap<i64, Vec<IngredientAmountResponse>> = HashMap::new();
    for (recipe_id, id, name, measurement_unit, amount) in ingredient_rows {
        ingredients_by_recipe
            .entry(recipe_id)
            .or_default()
            .push(IngredientAmountResponse {
                id,
                name,
                measurement_unit,
                amount,
            });
    }

    let favorited = favorited_recipe_ids(conn, viewer, &recipe_ids)?;
    let in_cart = carted_recipe_ids(conn, viewer, &recipe_ids)?;

    let mut responses = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        // The FK cascade guarantees the author row exists; a miss means a concurrent delete
        let author = match authors.get(&recipe.author_id) {
            Some(author) => author.clone(),
            None => return Err(diesel::result::Error::NotFound),
        };

        responses.push(RecipeResponse {
            id: recipe.id,
            tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
            author,
            ingredients: ingredients_by_recipe.remove(&recipe.id).unwrap_or_default(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
            name: recipe.name,
            image: image_url(recipe.id),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        });
    }

    Ok(responses)
}

pub fn recipe_response(
    conn: &mut PgConnection,
    viewer: Option<i64>,
    recipe: Recipe,
) -> QueryResult<RecipeResponse> {
    recipe_responses(conn, viewer, vec![recipe])?
        .pop()
        .ok_or(diesel::result::Error::NotFound)
}
