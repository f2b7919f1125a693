use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    db::ExploreFilter,
    error::{AppError, AppResult},
    models::Book,
    services::recommendations::{clamp_limit, RecommendationService},
    state::AppState,
};

const EXPLORE_DEFAULT_LIMIT: i64 = 4;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Handler for title/author prefix search
pub async fn search(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<Book>>> {
    if params.q.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let books = state.books.search_prefix(&params.q).await?;
    Ok(Json(books))
}

#[derive(Debug, Serialize)]
pub struct ExploreResponse {
    pub books: Vec<Book>,
    pub has_more: bool,
    pub total_count: i64,
}

fn parse_i64(params: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Handler for the paginated, filterable catalog explorer
pub async fn explore(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ExploreResponse>> {
    let offset = parse_i64(&params, "offset", 0).max(0);
    let limit = parse_i64(&params, "limit", EXPLORE_DEFAULT_LIMIT).max(1);

    let exclude_ids = non_empty(&params, "exclude_ids")
        .map(|raw| {
            raw.split(',')
                .filter_map(|id| id.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();

    let filter = ExploreFilter {
        offset,
        limit,
        author: non_empty(&params, "author"),
        isbn: non_empty(&params, "isbn"),
        genre: non_empty(&params, "genre"),
        published_year: non_empty(&params, "published_year").and_then(|y| y.parse().ok()),
        publisher: non_empty(&params, "publisher"),
        language: non_empty(&params, "language"),
        exclude_ids,
    };

    let page = state.books.explore(&filter).await?;
    let has_more = page.has_more(offset, limit);
    Ok(Json(ExploreResponse {
        books: page.books,
        has_more,
        total_count: page.total_count,
    }))
}

/// Handler for the filter-option lists used by the explorer UI
pub async fn filter_options(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> AppResult<Json<Value>> {
    let authors = state.books.distinct_authors(50).await?;
    let languages = state.books.distinct_languages().await?;
    let genres = state.books.list_genres("").await?;

    Ok(Json(json!({
        "authors": authors,
        "genres": genres,
        "languages": languages,
    })))
}

/// Handler for a single catalog entry
pub async fn book_detail(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(book_id): Path<i64>,
) -> AppResult<Json<Book>> {
    let book = state
        .books
        .by_id(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
    Ok(Json(book))
}

/// Handler for the user's saved books, in save order
pub async fn get_saved_books(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Book>>> {
    let ids = state.users.saved_book_ids(user.id).await?;
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let books = state.books.by_ids(&ids).await?;

    // The store returns id order; re-sort into save order.
    let index: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut ordered = books;
    ordered.sort_by_key(|b| index.get(&b.id).copied().unwrap_or(usize::MAX));
    Ok(Json(ordered))
}

/// Handler that saves or unsaves a book for the user
pub async fn toggle_save(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(book_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let book = state
        .books
        .by_id(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    // Reading through the store also folds in the legacy relation.
    let saved = state.users.saved_book_ids(user.id).await?;

    if saved.contains(&book.id) {
        let remaining: Vec<i64> = saved.into_iter().filter(|id| *id != book.id).collect();
        state.users.set_saved_book_ids(user.id, &remaining).await?;
        Ok(Json(json!({
            "message": "Book removed from saved list",
            "saved_books": remaining,
        })))
    } else {
        let mut updated = saved;
        updated.push(book.id);
        // Defend list uniqueness even if older rows carried duplicates.
        let mut seen = std::collections::HashSet::new();
        updated.retain(|id| seen.insert(*id));
        state.users.set_saved_book_ids(user.id, &updated).await?;
        Ok(Json(json!({
            "message": "Book added to saved list",
            "saved_books": updated,
        })))
    }
}

/// Handler for personalized recommendations
///
/// `limit` defaults to 4 and is clamped to [1, 24]; malformed values fall
/// back to the default instead of failing the request.
pub async fn recommended(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Book>>> {
    let limit = clamp_limit(params.get("limit").map(String::as_str));

    let service = RecommendationService::new(state.books.clone(), state.users.clone());
    let books = service.recommend_for_user(&user, limit).await?;
    Ok(Json(books))
}
