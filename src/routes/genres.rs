use axum::{extract::State, Json};

use crate::{error::AppResult, models::Genre, state::AppState};

/// Handler for the public genre list
pub async fn get_genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    let genres = state.books.list_genres("").await?;
    Ok(Json(genres))
}
