use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession<'a> {
    pub user_id: i64,
    pub token_hash: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(
    Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize, utoipa::ToSchema,
)]
#[diesel(table_name = crate::schema::tags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// HEX color code, e.g. `#00ff7f`
    pub color: Option<String>,
    pub slug: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::tags)]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

#[derive(
    Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize, utoipa::ToSchema,
)]
#[diesel(table_name = crate::schema::ingredients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::ingredients)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

/// Recipe row without the image bytes, which are only loaded by the image endpoint.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::recipes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recipes)]
pub struct NewRecipe<'a> {
    pub author_id: i64,
    pub name: &'a str,
    pub text: &'a str,
    pub image_content_type: &'a str,
    pub image_data: &'a [u8],
    pub cooking_time: i32,
}

/// Fields replaced by a recipe update. `None` image fields keep the stored image.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::recipes)]
pub struct RecipeChanges<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
    pub image_content_type: Option<&'a str>,
    pub image_data: Option<&'a [u8]>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recipe_tags)]
pub struct NewRecipeTag {
    pub recipe_id: i64,
    pub tag_id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::ingredient_amounts)]
pub struct NewIngredientAmount {
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub amount: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::favorite_recipes)]
pub struct NewFavoriteRecipe {
    pub user_id: i64,
    pub recipe_id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::shopping_carts)]
pub struct NewShoppingCartItem {
    pub user_id: i64,
    pub recipe_id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::subscriptions)]
pub struct NewSubscription {
    pub user_id: i64,
    pub author_id: i64,
}
