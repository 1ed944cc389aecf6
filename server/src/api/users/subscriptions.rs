use crate::api::recipes::read::ShortRecipeResponse;
use crate::api::{clamp_limit, ErrorResponse};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{Recipe, User};
use crate::queries::recipe_counts;
use crate::schema::{recipes, subscriptions, users};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// An author the requesting user follows, with a preview of their recipes
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    /// Newest recipes first, truncated by `recipes_limit`
    pub recipes: Vec<ShortRecipeResponse>,
    /// Total number of recipes by this author
    pub recipes_count: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubscriptionListParams {
    /// Number of authors to return (default: 100, max: 1000)
    pub limit: Option<i64>,
    /// Number of authors to skip (default: 0)
    pub offset: Option<i64>,
    /// Maximum number of recipes shown per author
    pub recipes_limit: Option<usize>,
}

/// Build subscription entries for `authors`, all of whom the viewer follows.
pub fn subscription_responses(
    conn: &mut PgConnection,
    authors: Vec<User>,
    recipes_limit: Option<usize>,
) -> QueryResult<Vec<SubscriptionResponse>> {
    let author_ids: Vec<i64> = authors.iter().map(|a| a.id).collect();
    let counts = recipe_counts(conn, &author_ids)?;

    let rows: Vec<Recipe> = if author_ids.is_empty() {
        Vec::new()
    } else {
        recipes::table
            .filter(recipes::author_id.eq_any(&author_ids))
            .order((recipes::pub_date.desc(), recipes::id.desc()))
            .select(Recipe::as_select())
            .load(conn)?
    };

    let mut by_author: HashMap<i64, Vec<ShortRecipeResponse>> = HashMap::new();
    for recipe in &rows {
        let entry = by_author.entry(recipe.author_id).or_default();
        if recipes_limit.map_or(true, |limit| entry.len() < limit) {
            entry.push(ShortRecipeResponse::from(recipe));
        }
    }

    Ok(authors
        .into_iter()
        .map(|author| SubscriptionResponse {
            recipes: by_author.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            email: author.email,
            id: author.id,
            username: author.username,
            first_name: author.first_name,
            last_name: author.last_name,
            is_subscribed: true,
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    tag = "users",
    params(SubscriptionListParams),
    responses(
        (status = 200, description = "Followed authors, newest subscription first", body = Vec<SubscriptionResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn list_subscriptions(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    Query(params): Query<SubscriptionListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = pool.get()?;

    let authors: Vec<User> = subscriptions::table
        .inner_join(users::table.on(users::id.eq(subscriptions::author_id)))
        .filter(subscriptions::user_id.eq(user.id))
        .order(subscriptions::id.desc())
        .limit(clamp_limit(params.limit))
        .offset(params.offset.unwrap_or(0).max(0))
        .select(User::as_select())
        .load(&mut conn)?;

    Ok(Json(subscription_responses(
        &mut conn,
        authors,
        params.recipes_limit,
    )?))
}
