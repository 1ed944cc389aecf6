//! Membership lookups shared by the read representations: which of a set of
//! recipes the viewer favorited / put in the cart, and which authors they follow.
//!
//! Each helper runs one query for the whole set so list endpoints stay free of N+1.

use crate::schema::{favorite_recipes, recipes, shopping_carts, subscriptions};
use diesel::dsl::count;
use diesel::prelude::*;
use std::collections::{HashMap, HashSet};

pub fn favorited_recipe_ids(
    conn: &mut PgConnection,
    user_id: Option<i64>,
    recipe_ids: &[i64],
) -> QueryResult<HashSet<i64>> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<i64> = favorite_recipes::table
        .filter(favorite_recipes::user_id.eq(user_id))
        .filter(favorite_recipes::recipe_id.eq_any(recipe_ids))
        .select(favorite_recipes::recipe_id)
        .load(conn)?;

    Ok(ids.into_iter().collect())
}

pub fn carted_recipe_ids(
    conn: &mut PgConnection,
    user_id: Option<i64>,
    recipe_ids: &[i64],
) -> QueryResult<HashSet<i64>> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<i64> = shopping_carts::table
        .filter(shopping_carts::user_id.eq(user_id))
        .filter(shopping_carts::recipe_id.eq_any(recipe_ids))
        .select(shopping_carts::recipe_id)
        .load(conn)?;

    Ok(ids.into_iter().collect())
}

/// Authors among `author_ids` that `user_id` is subscribed to.
pub fn subscribed_author_ids(
    conn: &mut PgConnection,
    user_id: Option<i64>,
    author_ids: &[i64],
) -> QueryResult<HashSet<i64>> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<i64> = subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .filter(subscriptions::author_id.eq_any(author_ids))
        .select(subscriptions::author_id)
        .load(conn)?;

    Ok(ids.into_iter().collect())
}

pub fn is_subscribed(conn: &mut PgConnection, user_id: i64, author_id: i64) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::author_id.eq(author_id)),
    ))
    .get_result(conn)
}

pub fn recipe_exists(conn: &mut PgConnection, recipe_id: i64) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        recipes::table.filter(recipes::id.eq(recipe_id)),
    ))
    .get_result(conn)
}

/// Number of recipes per author, for the authors in `author_ids`.
pub fn recipe_counts(
    conn: &mut PgConnection,
    author_ids: &[i64],
) -> QueryResult<HashMap<i64, i64>> {
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, i64)> = recipes::table
        .filter(recipes::author_id.eq_any(author_ids))
        .group_by(recipes::author_id)
        .select((recipes::author_id, count(recipes::id)))
        .load(conn)?;

    Ok(rows.into_iter().collect())
}
