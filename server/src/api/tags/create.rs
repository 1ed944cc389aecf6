use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewTag, Tag};
use crate::schema::tags;
use crate::validation::{
    is_valid_hex_color, is_valid_slug, max_length_message, required_text, FieldErrors,
    NON_FIELD_ERRORS,
};
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

pub const DEFAULT_COLOR: &str = "#00ff7f";
const NAME_MAX: usize = 200;
const SLUG_MAX: usize = 200;

pub const INVALID_SLUG: &str =
    "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.";
pub const INVALID_COLOR: &str = "Enter a valid HEX color, e.g. #00ff7f.";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateTagRequest {
    pub name: Option<String>,
    /// HEX color, defaults to `#00ff7f`
    pub color: Option<String>,
    pub slug: Option<String>,
}

impl CreateTagRequest {
    pub fn validate(&self) -> Result<NewTag, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", self.name.as_deref(), Some(NAME_MAX));

        let slug = required_text(&mut errors, "slug", self.slug.as_deref(), Some(SLUG_MAX));
        let slug = slug.filter(|slug| {
            let valid = is_valid_slug(slug);
            if !valid {
                errors.add("slug", INVALID_SLUG);
            }
            valid
        });

        let color = match self.color.as_deref().map(str::trim) {
            None | Some("") => Some(DEFAULT_COLOR.to_string()),
            Some(color) if color.chars().count() > 7 => {
                errors.add("color", max_length_message(7));
                None
            }
            Some(color) if !is_valid_hex_color(color) => {
                errors.add("color", INVALID_COLOR);
                None
            }
            Some(color) => Some(color.to_string()),
        };

        match (name, slug, color) {
            (Some(name), Some(slug), Some(color)) if errors.is_empty() => Ok(NewTag {
                name: name.to_string(),
                color: Some(color),
                slug: slug.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

fn already_exists(field: &str) -> String {
    format!("tag with this {} already exists.", field)
}

/// Report every unique field of `tag` that is already taken.
fn check_unique(conn: &mut PgConnection, tag: &NewTag) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    let name_taken: bool = diesel::select(diesel::dsl::exists(
        tags::table.filter(tags::name.eq(&tag.name)),
    ))
    .get_result(conn)?;
    if name_taken {
        errors.add("name", already_exists("name"));
    }

    if let Some(color) = &tag.color {
        let color_taken: bool = diesel::select(diesel::dsl::exists(
            tags::table.filter(tags::color.eq(color)),
        ))
        .get_result(conn)?;
        if color_taken {
            errors.add("color", already_exists("color"));
        }
    }

    let slug_taken: bool = diesel::select(diesel::dsl::exists(
        tags::table.filter(tags::slug.eq(&tag.slug)),
    ))
    .get_result(conn)?;
    if slug_taken {
        errors.add("slug", already_exists("slug"));
    }

    errors.into_result().map_err(ApiError::from)
}

#[utoipa::path(
    post,
    path = "/api/tags",
    tag = "tags",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 400, description = "Validation failed", body = FieldErrors),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("token_auth" = [])
    )
)]
pub async fn create_tag(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let new_tag = request.validate()?;

    let mut conn = pool.get()?;
    check_unique(&mut conn, &new_tag)?;

    let tag: Tag = diesel::insert_into(tags::table)
        .values(&new_tag)
        .returning(Tag::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            ApiError::on_unique_violation(e, NON_FIELD_ERRORS, "tag with these values already exists.")
        })?;

    tracing::info!(tag_id = tag.id, user_id = user.id, slug = %tag.slug, "created tag");

    Ok((StatusCode::CREATED, Json(tag)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{BLANK, REQUIRED};

    fn request(name: &str, color: Option<&str>, slug: &str) -> CreateTagRequest {
        CreateTagRequest {
            name: Some(name.to_string()),
            color: color.map(str::to_string),
            slug: Some(slug.to_string()),
        }
    }

    #[test]
    fn accepts_valid_tag() {
        let tag = request("Breakfast", Some("#E26C2D"), "breakfast")
            .validate()
            .unwrap();
        assert_eq!(tag.name, "Breakfast");
        assert_eq!(tag.color.as_deref(), Some("#E26C2D"));
        assert_eq!(tag.slug, "breakfast");
    }

    #[test]
    fn missing_color_gets_default() {
        let tag = request("Dinner", None, "dinner").validate().unwrap();
        assert_eq!(tag.color.as_deref(), Some(DEFAULT_COLOR));
    }

    #[test]
    fn reports_missing_and_blank_fields_together() {
        let errors = CreateTagRequest {
            name: None,
            color: None,
            slug: Some("  ".to_string()),
        }
        .validate()
        .unwrap_err();

        assert_eq!(errors.get("name").unwrap(), [REQUIRED]);
        assert_eq!(errors.get("slug").unwrap(), [BLANK]);
    }

    #[test]
    fn rejects_bad_slug() {
        let errors = request("Late night", None, "late night")
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("slug").unwrap(), [INVALID_SLUG]);
    }

    #[test]
    fn rejects_bad_color() {
        let errors = request("Lunch", Some("green"), "lunch")
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("color").unwrap(), [INVALID_COLOR]);

        let errors = request("Lunch", Some("#00ff7f00"), "lunch")
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("color").unwrap(), [max_length_message(7)]);
    }

    #[test]
    fn duplicate_message_names_the_field() {
        assert_eq!(already_exists("slug"), "tag with this slug already exists.");
    }
}
