//! Recipe write payload shared by create and update, and its validation.
//!
//! Validation runs in a fixed order and stops at the first failing rule, so a
//! client always sees one field error at a time. Lookups of referenced
//! ingredient and tag ids are done up front (`KnownIds`) so the rules
//! themselves stay pure.

use crate::error::ApiError;
use crate::images::{decode_image, DecodedImage, IMAGE_TOO_LARGE, MAX_FILE_SIZE};
use crate::models::{NewIngredientAmount, NewRecipeTag};
use crate::schema::{ingredient_amounts, ingredients, recipe_tags, tags};
use crate::validation::{
    required_text, FieldErrors, EMPTY_LIST, NON_FIELD_ERRORS, REQUIRED,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use utoipa::ToSchema;

/// Room for a base64-encoded image of `MAX_FILE_SIZE` plus the rest of the payload.
pub const MAX_REQUEST_BODY: usize = MAX_FILE_SIZE.div_ceil(3) * 4 + 1024 * 1024;

pub const NAME_MIN: usize = 4;
pub const NAME_MAX: usize = 200;
pub const COOKING_TIME_MIN: i64 = 1;
pub const COOKING_TIME_MAX: i64 = 300;
pub const AMOUNT_MIN: i64 = 1;

pub const NAME_TOO_SHORT: &str = "Recipe name must be at least 4 characters long.";
pub const NO_INGREDIENTS: &str = "Add at least one ingredient.";
pub const INGREDIENTS_REPEAT: &str = "Ingredients must not repeat.";
pub const TAGS_REPEAT: &str = "Tags must not repeat.";
pub const AMOUNT_TOO_SMALL: &str = "Minimum ingredient amount is 1.";
pub const AMOUNT_TOO_LARGE: &str = "Ingredient amount is too large.";
pub const COOKING_TIME_TOO_SHORT: &str = "Cooking time must be at least 1 minute.";
pub const COOKING_TIME_TOO_LONG: &str = "Cooking time must not exceed 300 minutes.";

/// One ingredient line in a write request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngredientAmountRequest {
    /// Ingredient ID
    pub id: i64,
    pub amount: i64,
}

/// Body of `POST /api/recipes` and `PUT|PATCH /api/recipes/{id}`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecipeWriteRequest {
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    /// Tag IDs
    pub tags: Option<Vec<i64>>,
    /// Base64 image, usually a data URL: `data:image/png;base64,...`
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    /// Minutes, 1 to 300
    pub cooking_time: Option<i64>,
}

/// Body limit for the recipe write endpoints.
pub fn body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_REQUEST_BODY)
}

/// Unwrap the JSON body. A body over the limit can only be an oversized image.
pub fn read_payload(
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> Result<RecipeWriteRequest, ApiError> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::field("image", IMAGE_TOO_LARGE))
        }
        Err(rejection) => Err(rejection.into()),
    }
}

/// Which of the referenced ids exist in the database.
#[derive(Debug, Default)]
pub struct KnownIds {
    pub ingredients: HashSet<i64>,
    pub tags: HashSet<i64>,
}

/// A write request that passed validation.
#[derive(Debug)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<i64>,
    /// (ingredient id, amount)
    pub ingredients: Vec<(i64, i32)>,
    /// `None` keeps the stored image (updates only)
    pub image: Option<DecodedImage>,
}

fn fail<T>(field: &str, message: impl Into<String>) -> Result<T, FieldErrors> {
    Err(FieldErrors::single(field, message))
}

/// Check a single required text field, keeping the first error it reports.
fn text_field(field: &str, value: Option<&str>, max: Option<usize>) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    match required_text(&mut errors, field, value, max) {
        Some(value) => Ok(value.to_string()),
        None => Err(errors),
    }
}

fn has_duplicates(ids: impl IntoIterator<Item = i64>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

impl RecipeWriteRequest {
    /// Ids referenced by the request, for prefetching `KnownIds`.
    pub fn referenced_ids(&self) -> (Vec<i64>, Vec<i64>) {
        let ingredient_ids: Vec<i64> = self
            .ingredients
            .iter()
            .flatten()
            .map(|item| item.id)
            .collect();
        let tag_ids = self.tags.clone().unwrap_or_default();
        (ingredient_ids, tag_ids)
    }

    pub fn validate(&self, known: &KnownIds, image_required: bool) -> Result<ValidRecipe, FieldErrors> {
        let name = text_field("name", self.name.as_deref(), Some(NAME_MAX))?;
        if name.chars().count() < NAME_MIN {
            return fail("name", NAME_TOO_SHORT);
        }

        let Some(items) = &self.ingredients else {
            return fail("ingredients", REQUIRED);
        };
        if items.is_empty() {
            return fail("ingredients", NO_INGREDIENTS);
        }
        if let Some(missing) = items.iter().find(|item| !known.ingredients.contains(&item.id)) {
            return fail(
                "ingredients",
                format!("Ingredient with id {} does not exist.", missing.id),
            );
        }
        if has_duplicates(items.iter().map(|item| item.id)) {
            return fail(NON_FIELD_ERRORS, INGREDIENTS_REPEAT);
        }

        let Some(tag_ids) = &self.tags else {
            return fail("tags", REQUIRED);
        };
        if tag_ids.is_empty() {
            return fail("tags", EMPTY_LIST);
        }
        if let Some(missing) = tag_ids.iter().find(|id| !known.tags.contains(*id)) {
            return fail(
                "tags",
                format!("Invalid pk \"{}\" - object does not exist.", missing),
            );
        }
        if has_duplicates(tag_ids.iter().copied()) {
            return fail("tags", TAGS_REPEAT);
        }

        let mut ingredients = Vec::with_capacity(items.len());
        for item in items {
            if item.amount < AMOUNT_MIN {
                return fail("amount", AMOUNT_TOO_SMALL);
            }
            let amount = i32::try_from(item.amount)
                .or_else(|_| fail("amount", AMOUNT_TOO_LARGE))?;
            ingredients.push((item.id, amount));
        }

        let cooking_time = match self.cooking_time {
            None => return fail("cooking_time", REQUIRED),
            Some(t) if t < COOKING_TIME_MIN => return fail("cooking_time", COOKING_TIME_TOO_SHORT),
            Some(t) if t > COOKING_TIME_MAX => return fail("cooking_time", COOKING_TIME_TOO_LONG),
            // Bounded by COOKING_TIME_MAX above
            Some(t) => t as i32,
        };

        let image = match self.image.as_deref() {
            None if image_required => return fail("image", REQUIRED),
            None => None,
            Some(payload) => Some(decode_image(payload).or_else(|e| fail("image", e))?),
        };

        let text = text_field("text", self.text.as_deref(), None)?;

        Ok(ValidRecipe {
            name,
            text,
            cooking_time,
            tag_ids: tag_ids.clone(),
            ingredients,
            image,
        })
    }
}

/// Look up which referenced ingredient and tag ids exist.
pub fn load_known_ids(conn: &mut PgConnection, request: &RecipeWriteRequest) -> QueryResult<KnownIds> {
    let (ingredient_ids, tag_ids) = request.referenced_ids();
    let mut known = KnownIds::default();

    if !ingredient_ids.is_empty() {
        let found: Vec<i64> = ingredients::table
            .filter(ingredients::id.eq_any(&ingredient_ids))
            .select(ingredients::id)
            .load(conn)?;
        known.ingredients.extend(found);
    }

    if !tag_ids.is_empty() {
        let found: Vec<i64> = tags::table
            .filter(tags::id.eq_any(&tag_ids))
            .select(tags::id)
            .load(conn)?;
        known.tags.extend(found);
    }

    Ok(known)
}

/// Replace the tag and ingredient links of `recipe_id`. Call inside a transaction.
pub fn replace_links(conn: &mut PgConnection, recipe_id: i64, recipe: &ValidRecipe) -> QueryResult<()> {
    diesel::delete(recipe_tags::table.filter(recipe_tags::recipe_id.eq(recipe_id))).execute(conn)?;
    diesel::delete(ingredient_amounts::table.filter(ingredient_amounts::recipe_id.eq(recipe_id)))
        .execute(conn)?;

    let new_tags: Vec<NewRecipeTag> = recipe
        .tag_ids
        .iter()
        .map(|&tag_id| NewRecipeTag { recipe_id, tag_id })
        .collect();
    diesel::insert_into(recipe_tags::table)
        .values(&new_tags)
        .execute(conn)?;

    let new_amounts: Vec<NewIngredientAmount> = recipe
        .ingredients
        .iter()
        .map(|&(ingredient_id, amount)| NewIngredientAmount {
            recipe_id,
            ingredient_id,
            amount,
        })
        .collect();
    diesel::insert_into(ingredient_amounts::table)
        .values(&new_amounts)
        .execute(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::tests::tiny_png_data_url;
    use crate::validation::BLANK;

    fn known() -> KnownIds {
        KnownIds {
            ingredients: [1, 2, 3].into_iter().collect(),
            tags: [10, 11].into_iter().collect(),
        }
    }

    fn request() -> RecipeWriteRequest {
        RecipeWriteRequest {
            ingredients: Some(vec![
                IngredientAmountRequest { id: 1, amount: 200 },
                IngredientAmountRequest { id: 2, amount: 3 },
            ]),
            tags: Some(vec![10]),
            image: Some(tiny_png_data_url()),
            name: Some("Pancakes".to_string()),
            text: Some("Mix and fry.".to_string()),
            cooking_time: Some(25),
        }
    }

    fn error_for(request: RecipeWriteRequest) -> FieldErrors {
        request.validate(&known(), true).unwrap_err()
    }

    #[test]
    fn accepts_valid_request() {
        let recipe = request().validate(&known(), true).unwrap();
        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.cooking_time, 25);
        assert_eq!(recipe.tag_ids, vec![10]);
        assert_eq!(recipe.ingredients, vec![(1, 200), (2, 3)]);
        assert_eq!(recipe.image.unwrap().content_type, "image/png");
    }

    #[test]
    fn short_name_rejected() {
        let errors = error_for(RecipeWriteRequest {
            name: Some("Egg".to_string()),
            ..request()
        });
        assert_eq!(errors.get("name").unwrap(), [NAME_TOO_SHORT]);
    }

    #[test]
    fn blank_name_rejected() {
        let errors = error_for(RecipeWriteRequest {
            name: Some("   ".to_string()),
            ..request()
        });
        assert_eq!(errors.get("name").unwrap(), [BLANK]);
    }

    #[test]
    fn empty_ingredients_rejected() {
        let errors = error_for(RecipeWriteRequest {
            ingredients: Some(vec![]),
            ..request()
        });
        assert_eq!(errors.get("ingredients").unwrap(), [NO_INGREDIENTS]);
    }

    #[test]
    fn unknown_ingredient_rejected() {
        let errors = error_for(RecipeWriteRequest {
            ingredients: Some(vec![IngredientAmountRequest { id: 99, amount: 1 }]),
            ..request()
        });
        assert_eq!(
            errors.get("ingredients").unwrap(),
            ["Ingredient with id 99 does not exist."]
        );
    }

    #[test]
    fn repeated_ingredients_rejected() {
        let errors = error_for(RecipeWriteRequest {
            ingredients: Some(vec![
                IngredientAmountRequest { id: 1, amount: 1 },
                IngredientAmountRequest { id: 1, amount: 2 },
            ]),
            ..request()
        });
        assert_eq!(errors.get(NON_FIELD_ERRORS).unwrap(), [INGREDIENTS_REPEAT]);
    }

    #[test]
    fn tag_rules() {
        let errors = error_for(RecipeWriteRequest {
            tags: Some(vec![]),
            ..request()
        });
        assert_eq!(errors.get("tags").unwrap(), [EMPTY_LIST]);

        let errors = error_for(RecipeWriteRequest {
            tags: Some(vec![42]),
            ..request()
        });
        assert_eq!(
            errors.get("tags").unwrap(),
            ["Invalid pk \"42\" - object does not exist."]
        );

        let errors = error_for(RecipeWriteRequest {
            tags: Some(vec![10, 11, 10]),
            ..request()
        });
        assert_eq!(errors.get("tags").unwrap(), [TAGS_REPEAT]);
    }

    #[test]
    fn amount_below_one_rejected() {
        let errors = error_for(RecipeWriteRequest {
            ingredients: Some(vec![IngredientAmountRequest { id: 3, amount: 0 }]),
            ..request()
        });
        assert_eq!(errors.get("amount").unwrap(), [AMOUNT_TOO_SMALL]);
    }

    #[test]
    fn cooking_time_bounds() {
        for (time, message) in [
            (None, REQUIRED),
            (Some(0), COOKING_TIME_TOO_SHORT),
            (Some(301), COOKING_TIME_TOO_LONG),
        ] {
            let errors = error_for(RecipeWriteRequest {
                cooking_time: time,
                ..request()
            });
            assert_eq!(errors.get("cooking_time").unwrap(), [message]);
        }

        for time in [1, 300] {
            let recipe = RecipeWriteRequest {
                cooking_time: Some(time),
                ..request()
            }
            .validate(&known(), true)
            .unwrap();
            assert_eq!(recipe.cooking_time, time as i32);
        }
    }

    #[test]
    fn image_required_only_on_create() {
        let without_image = RecipeWriteRequest {
            image: None,
            ..request()
        };
        assert_eq!(
            without_image.validate(&known(), true).unwrap_err().get("image").unwrap(),
            [REQUIRED]
        );
        assert!(without_image.validate(&known(), false).unwrap().image.is_none());
    }

    #[test]
    fn undecodable_image_rejected() {
        let errors = error_for(RecipeWriteRequest {
            image: Some("data:image/png;base64,!!!".to_string()),
            ..request()
        });
        assert!(errors.contains("image"));
    }

    #[test]
    fn first_failure_wins() {
        let errors = error_for(RecipeWriteRequest {
            name: Some("Egg".to_string()),
            cooking_time: Some(0),
            tags: Some(vec![]),
            ..request()
        });
        assert!(errors.contains("name"));
        assert!(!errors.contains("cooking_time"));
        assert!(!errors.contains("tags"));
    }

    #[test]
    fn referenced_ids_collects_both_lists() {
        let (ingredients, tags) = request().referenced_ids();
        assert_eq!(ingredients, vec![1, 2]);
        assert_eq!(tags, vec![10]);
    }
}
