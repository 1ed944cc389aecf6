use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{Ingredient, NewIngredient};
use crate::schema::ingredients;
use crate::validation::{required_text, FieldErrors, NON_FIELD_ERRORS};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

const FIELD_MAX: usize = 200;

pub const DUPLICATE_INGREDIENT: &str = "This ingredient already exists with this measurement unit.";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateIngredientRequest {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

impl CreateIngredientRequest {
    pub fn validate(&self) -> Result<NewIngredient, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", self.name.as_deref(), Some(FIELD_MAX));
        let unit = required_text(
            &mut errors,
            "measurement_unit",
            self.measurement_unit.as_deref(),
            Some(FIELD_MAX),
        );

        match (name, unit) {
            (Some(name), Some(unit)) => Ok(NewIngredient {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/ingredients",
    tag = "ingredients",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Ingredient created", body = Ingredient),
        (status = 400, description = "Validation failed or duplicate", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn create_ingredient(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<CreateIngredientRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let new_ingredient = request.validate()?;

    let mut conn = pool.get()?;

    let ingredient: Ingredient = diesel::insert_into(ingredients::table)
        .values(&new_ingredient)
        .returning(Ingredient::as_returning())
        .get_result(&mut conn)
        .map_err(|e| ApiError::on_unique_violation(e, NON_FIELD_ERRORS, DUPLICATE_INGREDIENT))?;

    tracing::info!(
        ingredient_id = ingredient.id,
        user_id = user.id,
        name = %ingredient.name,
        "created ingredient"
    );

    Ok((StatusCode::CREATED, Json(ingredient)))
}
