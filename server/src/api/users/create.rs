use crate::auth::hash_password;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::validation::{
    is_valid_email, is_valid_username, required_text, FieldErrors, BLANK, REQUIRED,
};
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub const EMAIL_MAX: usize = 254;
pub const NAME_MAX: usize = 150;
pub const EMAIL_TAKEN: &str = "A user with that email already exists.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Postgres' default name for the `users.email` UNIQUE constraint
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Registration data that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<ValidUser, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = required_text(&mut errors, "email", self.email.as_deref(), Some(EMAIL_MAX));
        if let Some(email) = email {
            if !is_valid_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }

        let username = required_text(
            &mut errors,
            "username",
            self.username.as_deref(),
            Some(NAME_MAX),
        );
        if let Some(username) = username {
            if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }

        let first_name = required_text(
            &mut errors,
            "first_name",
            self.first_name.as_deref(),
            Some(NAME_MAX),
        );
        let last_name = required_text(
            &mut errors,
            "last_name",
            self.last_name.as_deref(),
            Some(NAME_MAX),
        );

        // Passwords are not trimmed: surrounding whitespace is part of the secret
        let password = match self.password.as_deref() {
            None => {
                errors.add("password", REQUIRED);
                None
            }
            Some(p) if p.trim().is_empty() => {
                errors.add("password", BLANK);
                None
            }
            Some(p) => Some(p),
        };

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password))
                if errors.is_empty() =>
            {
                Ok(ValidUser {
                    email: email.to_lowercase(),
                    username: username.to_string(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    password: password.to_string(),
                })
            }
            _ => Err(errors),
        }
    }
}

/// Map an insert failure from a concurrent registration onto the field whose
/// unique constraint was violated.
pub fn registration_conflict(err: diesel::result::Error) -> ApiError {
    let email_taken = match &err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            info,
        ) => Some(info.constraint_name() == Some(EMAIL_CONSTRAINT)),
        _ => None,
    };

    match email_taken {
        Some(true) => ApiError::field("email", EMAIL_TAKEN),
        Some(false) => ApiError::field("username", USERNAME_TAKEN),
        None => ApiError::from(err),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = CreateUserResponse),
        (status = 400, description = "Invalid request", body = FieldErrors)
    )
)]
pub async fn create_user(
    State(pool): State<Arc<DbPool>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let valid = request.validate()?;

    let mut conn = pool.get()?;

    let mut errors = FieldErrors::new();
    let email_taken: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::email.eq(&valid.email)),
    ))
    .get_result(&mut conn)?;
    if email_taken {
        errors.add("email", EMAIL_TAKEN);
    }
    let username_taken: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::username.eq(&valid.username)),
    ))
    .get_result(&mut conn)?;
    if username_taken {
        errors.add("username", USERNAME_TAKEN);
    }
    errors.into_result()?;

    let password_hash = hash_password(&valid.password)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            email: &valid.email,
            username: &valid.username,
            first_name: &valid.first_name,
            last_name: &valid.last_name,
            password_hash: &password_hash,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(registration_conflict)?;

    tracing::info!(user_id = user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            email: Some("Cook@Example.com".to_string()),
            username: Some("cook".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: Some("Pavlova".to_string()),
            password: Some("meringue-42".to_string()),
        }
    }

    #[test]
    fn valid_request_normalizes_email() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.email, "cook@example.com");
        assert_eq!(valid.username, "cook");
    }

    #[test]
    fn every_missing_field_is_reported() {
        let errors = CreateUserRequest::default().validate().unwrap_err();
        for field in ["email", "username", "first_name", "last_name", "password"] {
            assert_eq!(errors.get(field).unwrap(), [REQUIRED], "field {}", field);
        }
    }

    #[test]
    fn bad_email_and_username_are_rejected() {
        let mut req = request();
        req.email = Some("not-an-email".to_string());
        req.username = Some("has space".to_string());
        let errors = req.validate().unwrap_err();
        assert!(errors.contains("email"));
        assert!(errors.contains("username"));
        assert!(!errors.contains("first_name"));
    }

    struct ConstraintInfo(&'static str);

    impl diesel::result::DatabaseErrorInformation for ConstraintInfo {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("users")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn conflict_on(constraint: &'static str) -> FieldErrors {
        let err = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new(ConstraintInfo(constraint)),
        );
        match registration_conflict(err) {
            ApiError::Validation(errors) => errors,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn racing_registration_reports_the_colliding_field() {
        let errors = conflict_on("users_email_key");
        assert_eq!(errors.get("email").unwrap(), [EMAIL_TAKEN]);
        assert!(!errors.contains("username"));

        let errors = conflict_on("users_username_key");
        assert_eq!(errors.get("username").unwrap(), [USERNAME_TAKEN]);
        assert!(!errors.contains("email"));
    }

    #[test]
    fn other_insert_failures_are_not_field_errors() {
        let err = registration_conflict(diesel::result::Error::RollbackTransaction);
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[test]
    fn overlong_names_are_rejected() {
        let mut req = request();
        req.first_name = Some("a".repeat(NAME_MAX + 1));
        let errors = req.validate().unwrap_err();
        assert!(errors.contains("first_name"));
    }
}
