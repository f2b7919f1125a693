use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::AdminUser,
    error::{AppError, AppResult},
    models::{Book, BookInput, Genre, User},
    services::csv_import,
    state::AppState,
};

const ADMIN_PAGE_SIZE: i64 = 10;

/// Handler listing all accounts
pub async fn get_all_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<Vec<User>>> {
    let users = state.users.all().await?;
    Ok(Json(users))
}

/// Handler deleting an account
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.users.delete(user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id, "Deleted user");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

fn parse_i64(params: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Handler for the paginated admin book listing with search
pub async fn get_all_books(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let query = params.get("q").map(|q| q.trim()).unwrap_or_default();
    let offset = parse_i64(&params, "offset", 0).max(0);
    let limit = parse_i64(&params, "limit", ADMIN_PAGE_SIZE).max(1);

    let page = state.books.admin_search(query, offset, limit).await?;
    let has_more = page.has_more(offset, limit);

    Ok(Json(json!({
        "books": page.books,
        "has_more": has_more,
        "total_count": page.total_count,
        "offset": offset,
        "limit": limit,
    })))
}

/// Handler creating a catalog entry
pub async fn add_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(input): Json<BookInput>,
) -> AppResult<(StatusCode, Json<Book>)> {
    if input.isbn.trim().is_empty() {
        return Err(AppError::InvalidInput("ISBN is required".to_string()));
    }
    let book = state.books.insert(&input).await?;
    tracing::info!(book_id = book.id, "Added book");
    Ok((StatusCode::CREATED, Json(book)))
}

/// Handler updating a catalog entry
pub async fn edit_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(book_id): Path<i64>,
    Json(input): Json<BookInput>,
) -> AppResult<Json<Book>> {
    let book = state
        .books
        .update(book_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
    Ok(Json(book))
}

/// Handler deleting a catalog entry
pub async fn delete_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(book_id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.books.delete(book_id).await? {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}

/// Add one genre (`{"name": ...}`) or several (`{"names": [...]}`)
#[derive(Debug, Deserialize)]
pub struct AddGenresRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

/// Handler creating genres
pub async fn add_genre(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<AddGenresRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let mut names: Vec<String> = request.name.into_iter().collect();
    names.extend(request.names);
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        return Err(AppError::InvalidInput(
            "Provide 'name' or 'names'".to_string(),
        ));
    }

    let mut created = Vec::new();
    let mut existing = Vec::new();
    for name in names {
        let (genre, was_created) = state.books.get_or_create_genre(&name).await?;
        if was_created {
            created.push(genre.name);
        } else {
            existing.push(genre.name);
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "created": created, "existing": existing })),
    ))
}

/// Handler listing genres with an optional name filter
pub async fn list_genres(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Genre>>> {
    let query = params.get("q").map(|q| q.trim()).unwrap_or_default();
    let genres = state.books.list_genres(query).await?;
    Ok(Json(genres))
}

#[derive(Debug, Deserialize)]
pub struct RenameGenreRequest {
    pub name: String,
}

/// Handler renaming a genre
pub async fn edit_genre(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(genre_id): Path<i64>,
    Json(request): Json<RenameGenreRequest>,
) -> AppResult<Json<Genre>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput(
            "Provide a new genre name".to_string(),
        ));
    }

    let genre = state
        .books
        .rename_genre(genre_id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("Genre not found".to_string()))?;
    Ok(Json(genre))
}

/// Handler deleting a genre
pub async fn delete_genre(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(genre_id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.books.delete_genre(genre_id).await? {
        return Err(AppError::NotFound("Genre not found".to_string()));
    }
    Ok(Json(json!({ "deleted": genre_id })))
}

/// Handler importing genres from a CSV body
pub async fn import_genres_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    body: String,
) -> AppResult<Json<Value>> {
    let (names, errors) = csv_import::parse_genre_csv(&body)?;

    let mut created = 0;
    let mut existing = 0;
    for name in names {
        let (_, was_created) = state.books.get_or_create_genre(&name).await?;
        if was_created {
            created += 1;
        } else {
            existing += 1;
        }
    }

    Ok(Json(json!({
        "created": created,
        "existing": existing,
        "errors": errors,
    })))
}

/// Handler importing books from a CSV body, upserting on ISBN
pub async fn import_books_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    body: String,
) -> AppResult<Json<Value>> {
    let (inputs, errors) = csv_import::parse_books_csv(&body)?;

    let mut created = 0;
    let mut updated = 0;
    for input in &inputs {
        if state.books.upsert_by_isbn(input).await? {
            created += 1;
        } else {
            updated += 1;
        }
    }

    tracing::info!(created, updated, errors = errors.len(), "Imported books CSV");

    Ok(Json(json!({
        "created": created,
        "updated": updated,
        "errors": errors,
    })))
}
