use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;

use bookshelf_api::auth::AuthKeys;
use bookshelf_api::db::{BookStore, ExploreFilter, ExplorePage, UserStore};
use bookshelf_api::error::AppResult;
use bookshelf_api::models::{Book, BookInput, Genre, User};
use bookshelf_api::routes::create_router;
use bookshelf_api::state::AppState;

/// Shared backing data for the in-memory test stores
#[derive(Default)]
struct SharedData {
    books: Mutex<Vec<Book>>,
    genres: Mutex<Vec<Genre>>,
    users: Mutex<Vec<User>>,
    favorites: Mutex<HashMap<i64, Vec<i64>>>,
    legacy_saved: Mutex<HashMap<i64, Vec<i64>>>,
}

impl SharedData {
    fn next_book_id(&self) -> i64 {
        self.books.lock().unwrap().iter().map(|b| b.id).max().unwrap_or(0) + 1
    }

    fn next_genre_id(&self) -> i64 {
        self.genres.lock().unwrap().iter().map(|g| g.id).max().unwrap_or(0) + 1
    }

    fn materialize(&self, id: i64, input: &BookInput) -> Book {
        Book {
            id,
            title: input.title.clone(),
            author: input.author.clone(),
            isbn: input.isbn.clone(),
            description: input.description.clone(),
            cover_image: input.cover_image.clone(),
            publish_date: input.publish_date,
            rating: input.rating,
            liked_percentage: input.liked_percentage,
            genres: Json(input.genres.iter().map(|g| json!(g)).collect()),
            language: input.language.clone(),
            page_count: input.page_count,
            is_free: input.is_free,
            publisher: input.publisher.clone(),
            buy_now_url: input.buy_now_url.clone(),
            preview_url: input.preview_url.clone(),
            download_url: input.download_url.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

struct TestBookStore(Arc<SharedData>);

#[async_trait::async_trait]
impl BookStore for TestBookStore {
    async fn all_excluding(&self, exclude: &[i64]) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| !exclude.contains(&b.id))
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }

    async fn by_ids(&self, ids: &[i64]) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.0.books.lock().unwrap().iter().find(|b| b.id == id).cloned())
    }

    async fn all(&self) -> AppResult<Vec<Book>> {
        self.all_excluding(&[]).await
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.0.books.lock().unwrap().len() as i64)
    }

    async fn search_prefix(&self, query: &str) -> AppResult<Vec<Book>> {
        let q = query.to_lowercase();
        let mut books: Vec<Book> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                b.title.to_lowercase().starts_with(&q) || b.author.to_lowercase().starts_with(&q)
            })
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }

    async fn explore(&self, filter: &ExploreFilter) -> AppResult<ExplorePage> {
        let matches_opt = |value: &str, wanted: &Option<String>| {
            wanted
                .as_ref()
                .map(|w| value.to_lowercase().contains(&w.to_lowercase()))
                .unwrap_or(true)
        };
        let mut books: Vec<Book> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| !filter.exclude_ids.contains(&b.id))
            .filter(|b| matches_opt(&b.author, &filter.author))
            .filter(|b| matches_opt(&b.isbn, &filter.isbn))
            .filter(|b| matches_opt(&b.language, &filter.language))
            .filter(|b| matches_opt(&b.publisher, &filter.publisher))
            .filter(|b| {
                filter
                    .genre
                    .as_ref()
                    .map(|g| {
                        b.genre_names()
                            .iter()
                            .any(|name| name.to_lowercase().contains(&g.to_lowercase()))
                    })
                    .unwrap_or(true)
            })
            .filter(|b| {
                filter
                    .published_year
                    .map(|year| {
                        b.publish_date
                            .map(|d| chrono::Datelike::year(&d) == year)
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);

        let total_count = books.len() as i64;
        let page = books
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(ExplorePage { books: page, total_count })
    }

    async fn admin_search(&self, query: &str, offset: i64, limit: i64) -> AppResult<ExplorePage> {
        let q = query.to_lowercase();
        let mut books: Vec<Book> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                q.is_empty()
                    || b.title.to_lowercase().starts_with(&q)
                    || b.author.to_lowercase().starts_with(&q)
                    || b.isbn.to_lowercase().contains(&q)
                    || b.genre_names().iter().any(|g| g.to_lowercase().contains(&q))
            })
            .cloned()
            .collect();
        books.sort_by_key(|b| b.id);

        let total_count = books.len() as i64;
        let page = books
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(ExplorePage { books: page, total_count })
    }

    async fn insert(&self, input: &BookInput) -> AppResult<Book> {
        let book = self.0.materialize(self.0.next_book_id(), input);
        self.0.books.lock().unwrap().push(book.clone());
        Ok(book)
    }

    async fn update(&self, id: i64, input: &BookInput) -> AppResult<Option<Book>> {
        let mut books = self.0.books.lock().unwrap();
        let Some(slot) = books.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        let updated = self.0.materialize(id, input);
        *slot = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut books = self.0.books.lock().unwrap();
        let before = books.len();
        books.retain(|b| b.id != id);
        Ok(books.len() < before)
    }

    async fn upsert_by_isbn(&self, input: &BookInput) -> AppResult<bool> {
        let existing = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.isbn == input.isbn)
            .map(|b| b.id);
        match existing {
            Some(id) => {
                self.update(id, input).await?;
                Ok(false)
            }
            None => {
                self.insert(input).await?;
                Ok(true)
            }
        }
    }

    async fn distinct_authors(&self, limit: i64) -> AppResult<Vec<String>> {
        let mut authors: Vec<String> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.author.clone())
            .filter(|a| !a.is_empty())
            .collect();
        authors.sort();
        authors.dedup();
        authors.truncate(limit as usize);
        Ok(authors)
    }

    async fn distinct_languages(&self) -> AppResult<Vec<String>> {
        let mut languages: Vec<String> = self
            .0
            .books
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.language.clone())
            .filter(|l| !l.is_empty())
            .collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn list_genres(&self, query: &str) -> AppResult<Vec<Genre>> {
        let q = query.to_lowercase();
        let mut genres: Vec<Genre> = self
            .0
            .genres
            .lock()
            .unwrap()
            .iter()
            .filter(|g| q.is_empty() || g.name.to_lowercase().contains(&q))
            .cloned()
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn genre_by_id(&self, id: i64) -> AppResult<Option<Genre>> {
        Ok(self.0.genres.lock().unwrap().iter().find(|g| g.id == id).cloned())
    }

    async fn genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        Ok(self
            .0
            .genres
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.name == name)
            .cloned())
    }

    async fn get_or_create_genre(&self, name: &str) -> AppResult<(Genre, bool)> {
        if let Some(genre) = self.genre_by_name(name).await? {
            return Ok((genre, false));
        }
        let genre = Genre {
            id: self.0.next_genre_id(),
            name: name.to_string(),
        };
        self.0.genres.lock().unwrap().push(genre.clone());
        Ok((genre, true))
    }

    async fn rename_genre(&self, id: i64, name: &str) -> AppResult<Option<Genre>> {
        let mut genres = self.0.genres.lock().unwrap();
        let Some(genre) = genres.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        genre.name = name.to_string();
        Ok(Some(genre.clone()))
    }

    async fn delete_genre(&self, id: i64) -> AppResult<bool> {
        let mut genres = self.0.genres.lock().unwrap();
        let before = genres.len();
        genres.retain(|g| g.id != id);
        Ok(genres.len() < before)
    }
}

struct TestUserStore(Arc<SharedData>);

#[async_trait::async_trait]
impl UserStore for TestUserStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        preferred_language: &str,
    ) -> AppResult<User> {
        let mut users = self.0.users.lock().unwrap();
        let user = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_admin: false,
            preferred_language: preferred_language.to_string(),
            notifications_enabled: true,
            saved_book_ids: Json(Vec::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.0.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn all(&self) -> AppResult<Vec<User>> {
        Ok(self.0.users.lock().unwrap().clone())
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut users = self.0.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.0.users.lock().unwrap().len() as i64)
    }

    async fn favorite_genres(&self, user_id: i64) -> AppResult<Vec<Genre>> {
        let ids = self
            .0
            .favorites
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        let genres = self.0.genres.lock().unwrap();
        let mut result: Vec<Genre> = genres
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn set_favorite_genres(&self, user_id: i64, genre_ids: &[i64]) -> AppResult<()> {
        self.0
            .favorites
            .lock()
            .unwrap()
            .insert(user_id, genre_ids.to_vec());
        Ok(())
    }

    async fn add_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()> {
        let mut favorites = self.0.favorites.lock().unwrap();
        let entry = favorites.entry(user_id).or_default();
        if !entry.contains(&genre_id) {
            entry.push(genre_id);
        }
        Ok(())
    }

    async fn remove_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()> {
        if let Some(entry) = self.0.favorites.lock().unwrap().get_mut(&user_id) {
            entry.retain(|id| *id != genre_id);
        }
        Ok(())
    }

    async fn saved_book_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let stored = self
            .0
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.saved_book_ids.0.clone())
            .unwrap_or_default();
        if !stored.is_empty() {
            return Ok(stored);
        }

        let legacy = self
            .0
            .legacy_saved
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        if !legacy.is_empty() {
            self.set_saved_book_ids(user_id, &legacy).await?;
        }
        Ok(legacy)
    }

    async fn set_saved_book_ids(&self, user_id: i64, ids: &[i64]) -> AppResult<()> {
        if let Some(user) = self
            .0
            .users
            .lock()
            .unwrap()
            .iter_mut()
            .find(|u| u.id == user_id)
        {
            user.saved_book_ids = Json(ids.to_vec());
        }
        Ok(())
    }
}

struct TestApp {
    server: TestServer,
    data: Arc<SharedData>,
}

fn create_test_app() -> TestApp {
    let data = Arc::new(SharedData::default());
    let state = AppState::with_stores(
        Arc::new(TestBookStore(data.clone())),
        Arc::new(TestUserStore(data.clone())),
        AuthKeys::new("test-secret", 3600),
    );
    let server = TestServer::new(create_router(state)).unwrap();
    TestApp { server, data }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn register(app: &TestApp, username: &str, email: &str) -> String {
    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": username,
            "email": email,
            "password": "hunter2hunter2",
            "preferred_language": "English"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    body["access"].as_str().unwrap().to_string()
}

fn seed_book(app: &TestApp, id: i64, title: &str, genres: &[&str], rating: f64, liked: f64) {
    let input = BookInput {
        title: title.to_string(),
        author: format!("Author of {}", title),
        isbn: format!("isbn-{}", id),
        description: String::new(),
        cover_image: String::new(),
        publish_date: None,
        rating,
        liked_percentage: liked,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        language: "English".to_string(),
        page_count: 0,
        is_free: false,
        publisher: String::new(),
        buy_now_url: String::new(),
        preview_url: String::new(),
        download_url: String::new(),
    };
    let book = app.data.materialize(id, &input);
    app.data.books.lock().unwrap().push(book);
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_register_login_and_me_flow() {
    let app = create_test_app();
    let _ = register(&app, "reader", "reader@example.com").await;

    // Duplicate email is rejected
    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": "other",
            "email": "reader@example.com",
            "password": "hunter2hunter2"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // Wrong password is rejected
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "reader@example.com", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // Correct login yields a working token
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "reader@example.com", "password": "hunter2hunter2" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let token = body["access"].as_str().unwrap();

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(AUTHORIZATION, bearer(token))
        .await;
    response.assert_status_ok();
    let me: serde_json::Value = response.json();
    assert_eq!(me["username"], "reader");
    assert_eq!(me["is_admin"], false);
    assert_eq!(me["saved_books"], json!([]));
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = create_test_app();
    let response = app.server.get("/api/v1/books/recommended").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_recommendations_prefer_favorite_genre() {
    let app = create_test_app();
    seed_book(&app, 1, "Fantasy Pick", &["Fantasy"], 4.0, 90.0);
    seed_book(&app, 2, "Romance Pick", &["Romance"], 5.0, 95.0);

    let token = register(&app, "reader", "reader@example.com").await;

    // Mark Fantasy as a favorite (created on first use)
    let response = app
        .server
        .post("/api/v1/users/preferences/favorite-genres/add")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Fantasy" }))
        .await;
    response.assert_status_ok();

    // The genre-matching book outranks the higher-rated one
    let response = app
        .server
        .get("/api/v1/books/recommended")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let books: Vec<serde_json::Value> = response.json();
    let ids: Vec<i64> = books.iter().map(|b| b["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_cold_start_falls_back_to_top_rated() {
    let app = create_test_app();
    seed_book(&app, 1, "Mid", &["Fantasy"], 3.0, 90.0);
    seed_book(&app, 2, "Best", &["Romance"], 4.5, 80.0);
    seed_book(&app, 3, "Tie", &["Horror"], 4.5, 20.0);

    let token = register(&app, "newbie", "newbie@example.com").await;

    let response = app
        .server
        .get("/api/v1/books/recommended")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let books: Vec<serde_json::Value> = response.json();
    let ids: Vec<i64> = books.iter().map(|b| b["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_recommended_limit_is_coerced() {
    let app = create_test_app();
    for i in 1..=8 {
        seed_book(&app, i, &format!("Book {}", i), &["Fantasy"], 3.0, 50.0);
    }
    let token = register(&app, "reader", "reader@example.com").await;

    // Non-numeric limit coerces to the default of 4
    let response = app
        .server
        .get("/api/v1/books/recommended")
        .add_query_param("limit", "plenty")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let books: Vec<serde_json::Value> = response.json();
    assert_eq!(books.len(), 4);

    // Oversized limit clamps to 24, undersized to 1
    let response = app
        .server
        .get("/api/v1/books/recommended")
        .add_query_param("limit", "0")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    assert_eq!(books.len(), 1);
}

#[tokio::test]
async fn test_toggle_save_and_saved_order() {
    let app = create_test_app();
    seed_book(&app, 1, "First", &["Fantasy"], 4.0, 90.0);
    seed_book(&app, 2, "Second", &["Fantasy"], 4.5, 80.0);
    let token = register(&app, "reader", "reader@example.com").await;

    for id in [2, 1] {
        let response = app
            .server
            .post(&format!("/api/v1/books/{}/toggle-save", id))
            .add_header(AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
    }

    // Saved list preserves save order, not id order
    let response = app
        .server
        .get("/api/v1/users/saved-books")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    let ids: Vec<i64> = books.iter().map(|b| b["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![2, 1]);

    // Saved books never show up in recommendations
    let response = app
        .server
        .get("/api/v1/books/recommended")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    assert!(books.is_empty());

    // Toggling again removes
    let response = app
        .server
        .post("/api/v1/books/2/toggle-save")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["saved_books"], json!([1]));

    // Unknown book is a 404
    let response = app
        .server
        .post("/api/v1/books/999/toggle-save")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_legacy_saved_books_are_migrated_on_read() {
    let app = create_test_app();
    seed_book(&app, 1, "Old Save", &["Fantasy"], 4.0, 90.0);
    seed_book(&app, 2, "Older Save", &["Fantasy"], 4.0, 90.0);
    let token = register(&app, "returning", "returning@example.com").await;

    let user_id = app.data.users.lock().unwrap()[0].id;
    app.data
        .legacy_saved
        .lock()
        .unwrap()
        .insert(user_id, vec![2, 1]);

    let response = app
        .server
        .get("/api/v1/users/saved-books")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    let ids: Vec<i64> = books.iter().map(|b| b["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![2, 1]);

    // The canonical list now holds the copied ids
    let stored = app.data.users.lock().unwrap()[0].saved_book_ids.0.clone();
    assert_eq!(stored, vec![2, 1]);
}

#[tokio::test]
async fn test_search_and_explore() {
    let app = create_test_app();
    seed_book(&app, 1, "Dune", &["Sci-Fi"], 4.2, 96.0);
    seed_book(&app, 2, "Dune Messiah", &["Sci-Fi"], 3.9, 85.0);
    seed_book(&app, 3, "Emma", &["Classic"], 4.0, 88.0);
    let token = register(&app, "reader", "reader@example.com").await;

    // Empty query returns an empty list, not everything
    let response = app
        .server
        .get("/api/v1/books/search")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    assert!(books.is_empty());

    let response = app
        .server
        .get("/api/v1/books/search")
        .add_query_param("q", "dune")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let books: Vec<serde_json::Value> = response.json();
    assert_eq!(books.len(), 2);

    // Explore paginates and reports the total
    let response = app
        .server
        .get("/api/v1/books/explore")
        .add_query_param("limit", "2")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["books"].as_array().unwrap().len(), 2);

    // Genre filter narrows results
    let response = app
        .server
        .get("/api/v1/books/explore")
        .add_query_param("genre", "classic")
        .add_query_param("limit", "10")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["books"][0]["title"], "Emma");
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_flag() {
    let app = create_test_app();
    let token = register(&app, "reader", "reader@example.com").await;

    let response = app
        .server
        .get("/api/v1/admin/users")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/v1/books/add")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "X", "author": "Y", "isbn": "z-1" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_book_and_genre_management() {
    let app = create_test_app();
    let token = register(&app, "admin", "admin@example.com").await;
    app.data.users.lock().unwrap()[0].is_admin = true;

    // Create a book
    let response = app
        .server
        .post("/api/v1/books/add")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "The Dispossessed",
            "author": "Ursula K. Le Guin",
            "isbn": "9780061054884",
            "rating": 4.2,
            "genres": ["Sci-Fi"]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: serde_json::Value = response.json();
    let book_id = created["id"].as_i64().unwrap();

    // Edit it
    let response = app
        .server
        .put(&format!("/api/v1/books/{}/edit", book_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "The Dispossessed",
            "author": "Ursula K. Le Guin",
            "isbn": "9780061054884",
            "rating": 4.5
        }))
        .await;
    response.assert_status_ok();
    let edited: serde_json::Value = response.json();
    assert_eq!(edited["rating"], 4.5);

    // Genres: bulk add reports created vs existing
    let response = app
        .server
        .post("/api/v1/admin/genres/add")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "names": ["Sci-Fi", "Utopian", "Sci-Fi"] }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["created"], json!(["Sci-Fi", "Utopian"]));
    assert_eq!(body["existing"], json!(["Sci-Fi"]));

    // Delete the book
    let response = app
        .server
        .delete(&format!("/api/v1/books/{}/delete", book_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let response = app
        .server
        .delete("/api/v1/books/999/delete")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_books_csv_import() {
    let app = create_test_app();
    let token = register(&app, "admin", "admin@example.com").await;
    app.data.users.lock().unwrap()[0].is_admin = true;

    let csv = "title,author,isbn,rating,genres\n\
               Dune,Frank Herbert,9780441013593,4.2,\"Sci-Fi, Classic\"\n\
               No Isbn,Nobody,,1.0,\n";
    let response = app
        .server
        .post("/api/v1/admin/books/import-csv")
        .add_header(AUTHORIZATION, bearer(&token))
        .text(csv)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["created"], 1);
    assert_eq!(body["updated"], 0);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);

    // Re-import updates in place
    let response = app
        .server
        .post("/api/v1/admin/books/import-csv")
        .add_header(AUTHORIZATION, bearer(&token))
        .text(csv)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["created"], 0);
    assert_eq!(body["updated"], 1);
}

#[tokio::test]
async fn test_dashboard_stats() {
    let app = create_test_app();
    seed_book(&app, 1, "A", &["Fantasy"], 4.0, 90.0);
    seed_book(&app, 2, "B", &["Fantasy", "Adventure"], 3.0, 50.0);
    let token = register(&app, "reader", "reader@example.com").await;

    let response = app
        .server
        .get("/api/v1/dashboard")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_books"], 2);
    assert_eq!(body["total_users"], 1);
    assert_eq!(body["avg_rating"], 3.5);
    assert_eq!(body["most_popular_genres"][0], "Fantasy");
}
