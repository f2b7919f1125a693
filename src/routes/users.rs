use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::Genre,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub genres: Vec<String>,
}

/// Replaces the user's favorite genres with the named set
///
/// Names that do not match an existing genre are ignored, matching the
/// lookup-by-name semantics of the preference form.
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<PreferencesRequest>,
) -> AppResult<Json<Value>> {
    if request.genres.is_empty() {
        return Err(AppError::InvalidInput(
            "Provide at least one genre".to_string(),
        ));
    }

    let mut genre_ids = Vec::new();
    for name in &request.genres {
        if let Some(genre) = state.books.genre_by_name(name.trim()).await? {
            genre_ids.push(genre.id);
        }
    }

    state.users.set_favorite_genres(user.id, &genre_ids).await?;
    Ok(Json(json!({ "detail": "Preferences updated successfully." })))
}

/// Handler for the user's favorite genres
pub async fn get_favorite_genres(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Genre>>> {
    let genres = state.users.favorite_genres(user.id).await?;
    Ok(Json(genres))
}

/// Reference to a genre by id or name; one of the two must be present
#[derive(Debug, Deserialize)]
pub struct GenreRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

async fn resolve_genre(
    state: &AppState,
    genre_ref: &GenreRef,
    create_missing: bool,
) -> AppResult<Genre> {
    if let Some(id) = genre_ref.id {
        return state
            .books
            .genre_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Genre not found".to_string()));
    }

    let name = genre_ref
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AppError::InvalidInput("Provide either id or name for the genre.".to_string())
        })?;

    if create_missing {
        let (genre, _) = state.books.get_or_create_genre(name).await?;
        Ok(genre)
    } else {
        state
            .books
            .genre_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound("Genre not found".to_string()))
    }
}

/// Adds one favorite genre, by id or name (creating by name if new)
pub async fn add_favorite_genre(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GenreRef>,
) -> AppResult<Json<Genre>> {
    let genre = resolve_genre(&state, &request, true).await?;
    state.users.add_favorite_genre(user.id, genre.id).await?;
    Ok(Json(genre))
}

/// Removes one favorite genre, by id or name
pub async fn remove_favorite_genre(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GenreRef>,
) -> AppResult<Json<Value>> {
    let genre = resolve_genre(&state, &request, false).await?;
    state.users.remove_favorite_genre(user.id, genre.id).await?;
    Ok(Json(json!({ "removed": genre })))
}
