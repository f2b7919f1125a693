use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

/// A catalog entry as stored in the database
///
/// The `genres` column is a JSON array. Historical imports left non-string
/// members in some rows, so the raw values are kept here and filtered to
/// strings wherever genre membership matters (see [`Book::genre_names`]).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub description: String,
    pub cover_image: String,
    pub publish_date: Option<NaiveDate>,
    pub rating: f64,
    pub liked_percentage: f64,
    pub genres: Json<Vec<Value>>,
    pub language: String,
    pub page_count: i32,
    pub is_free: bool,
    pub publisher: String,
    pub buy_now_url: String,
    pub preview_url: String,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// String-typed genre entries; malformed members are dropped silently
    pub fn genre_names(&self) -> Vec<String> {
        self.genres
            .iter()
            .filter_map(|g| g.as_str().map(str::to_owned))
            .collect()
    }
}

/// Payload for creating or updating a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub isbn: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub publish_date: Option<NaiveDate>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub liked_percentage: f64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub page_count: i32,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub buy_now_url: String,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub download_url: String,
}

fn default_language() -> String {
    "English".to_string()
}
