use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};
use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod books;
pub mod dashboard;
pub mod genres;
pub mod users;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/users/me", get(auth::current_user))
        // Preferences
        .route("/users/preferences", put(users::update_preferences))
        .route(
            "/users/preferences/favorite-genres",
            get(users::get_favorite_genres),
        )
        .route(
            "/users/preferences/favorite-genres/add",
            post(users::add_favorite_genre),
        )
        .route(
            "/users/preferences/favorite-genres/remove",
            delete(users::remove_favorite_genre),
        )
        .route("/users/saved-books", get(books::get_saved_books))
        // Catalog
        .route("/genres", get(genres::get_genres))
        .route("/books/recommended", get(books::recommended))
        .route("/books/search", get(books::search))
        .route("/books/explore", get(books::explore))
        .route("/books/filter-options", get(books::filter_options))
        .route("/books/add", post(admin::add_book))
        .route("/books/:id", get(books::book_detail))
        .route("/books/:id/toggle-save", post(books::toggle_save))
        .route("/books/:id/edit", put(admin::edit_book))
        .route("/books/:id/delete", delete(admin::delete_book))
        // Dashboard
        .route("/dashboard", get(dashboard::stats))
        // Admin
        .route("/admin/users", get(admin::get_all_users))
        .route("/admin/users/:id/delete", delete(admin::delete_user))
        .route("/admin/books", get(admin::get_all_books))
        .route("/admin/books/import-csv", post(admin::import_books_csv))
        .route("/admin/genres", get(admin::list_genres))
        .route("/admin/genres/add", post(admin::add_genre))
        .route("/admin/genres/:id/edit", put(admin::edit_genre))
        .route("/admin/genres/:id/delete", delete(admin::delete_genre))
        .route("/admin/genres/import-csv", post(admin::import_genres_csv))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
