use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::Genre;

/// An account row
///
/// `saved_book_ids` is the canonical ordered saved list; entries are appended
/// on save, so list order is save order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub preferred_language: String,
    pub notifications_enabled: bool,
    pub saved_book_ids: Json<Vec<i64>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile shape returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub favorite_genres: Vec<Genre>,
    pub preferred_language: String,
    pub saved_books: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDetail {
    pub fn from_user(user: &User, favorite_genres: Vec<Genre>, saved_books: Vec<i64>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            favorite_genres,
            preferred_language: user.preferred_language.clone(),
            saved_books,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
