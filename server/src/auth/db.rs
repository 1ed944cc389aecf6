use crate::models::{NewSession, User};
use crate::schema::{sessions, users};
use chrono::{Duration, Utc};
use diesel::prelude::*;

use super::crypto::{generate_token, hash_token};

pub const SESSION_LIFETIME_DAYS: i64 = 30;

pub fn create_session(conn: &mut PgConnection, user_id: i64) -> QueryResult<String> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    diesel::insert_into(sessions::table)
        .values(&NewSession {
            user_id,
            token_hash: &token_hash,
            expires_at,
        })
        .execute(conn)?;

    Ok(token)
}

/// Remove the session for `token`. Returns the number of rows deleted.
pub fn delete_session(conn: &mut PgConnection, token: &str) -> QueryResult<usize> {
    let token_hash = hash_token(token);
    diesel::delete(sessions::table.filter(sessions::token_hash.eq(&token_hash))).execute(conn)
}

pub fn get_user_from_token(conn: &mut PgConnection, token: &str) -> QueryResult<Option<User>> {
    let token_hash = hash_token(token);

    sessions::table
        .inner_join(users::table)
        .filter(sessions::token_hash.eq(&token_hash))
        .filter(sessions::expires_at.gt(Utc::now()))
        .select(User::as_select())
        .first(conn)
        .optional()
}
