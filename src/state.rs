use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    auth::AuthKeys,
    config::Config,
    db::{BookStore, PgBookStore, PgUserStore, UserStore},
};

/// Shared application state
///
/// Stores are constructed once by the composition root and injected here;
/// handlers only ever see the trait objects.
#[derive(Clone)]
pub struct AppState {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub auth: AuthKeys,
}

impl AppState {
    /// Creates state backed by Postgres stores
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            books: Arc::new(PgBookStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool)),
            auth: AuthKeys::new(&config.jwt_secret, config.token_ttl_secs),
        }
    }

    /// Creates state from pre-built stores (used by tests)
    pub fn with_stores(
        books: Arc<dyn BookStore>,
        users: Arc<dyn UserStore>,
        auth: AuthKeys,
    ) -> Self {
        Self { books, users, auth }
    }
}
