use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{self, AuthUser},
    error::{AppError, AppResult},
    models::UserDetail,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub preferred_language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserDetail,
    pub access: String,
}

/// Builds the profile response for a user, including favorite genres and the
/// (possibly legacy-migrated) saved list
async fn user_detail(state: &AppState, user: &crate::models::User) -> AppResult<UserDetail> {
    let favorite_genres = state.users.favorite_genres(user.id).await?;
    let saved_books = state.users.saved_book_ids(user.id).await?;
    Ok(UserDetail::from_user(user, favorite_genres, saved_books))
}

/// Handler for account registration
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    let preferred_language = request
        .preferred_language
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("English")
        .to_string();

    if username.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Missing required fields".to_string(),
        ));
    }

    if state.users.by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if state.users.by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = auth::hash_password(&request.password)?;
    let user = state
        .users
        .create(&username, &email, &password_hash, &preferred_language)
        .await?;

    tracing::info!(user_id = user.id, "Registered new user");

    let access = state.auth.mint_token(user.id)?;
    let detail = user_detail(&state, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: detail,
            access,
        }),
    ))
}

/// Handler for login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .users
        .by_email(&email)
        .await?
        .filter(|u| auth::verify_password(&request.password, &u.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let access = state.auth.mint_token(user.id)?;
    let detail = user_detail(&state, &user).await?;
    Ok(Json(AuthResponse {
        user: detail,
        access,
    }))
}

/// Handler for the current user's profile
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UserDetail>> {
    let detail = user_detail(&state, &user).await?;
    Ok(Json(detail))
}
