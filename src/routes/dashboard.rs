use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    auth::AuthUser,
    error::AppResult,
    services::stats::{self, DashboardStats},
    state::AppState,
};

/// Handler computing dashboard statistics over the current catalog
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> AppResult<Json<DashboardStats>> {
    let books = state.books.all().await?;
    let total_users = state.users.count().await?;
    let stats = stats::compute(&books, total_users, Utc::now());
    Ok(Json(stats))
}
