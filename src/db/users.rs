use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Genre, User},
};

/// Account storage abstraction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        preferred_language: &str,
    ) -> AppResult<User>;

    async fn by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn all(&self) -> AppResult<Vec<User>>;

    async fn delete(&self, id: i64) -> AppResult<bool>;

    async fn count(&self) -> AppResult<i64>;

    /// The user's favorite genres, ordered by name
    async fn favorite_genres(&self, user_id: i64) -> AppResult<Vec<Genre>>;

    async fn set_favorite_genres(&self, user_id: i64, genre_ids: &[i64]) -> AppResult<()>;

    async fn add_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()>;

    async fn remove_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()>;

    /// The canonical saved-book id list in save order
    ///
    /// When the canonical list is empty, any rows in the legacy saved-books
    /// relation are copied into it verbatim before returning. The copy is
    /// idempotent, so two requests racing through it converge on the same
    /// persisted value.
    async fn saved_book_ids(&self, user_id: i64) -> AppResult<Vec<i64>>;

    async fn set_saved_book_ids(&self, user_id: i64, ids: &[i64]) -> AppResult<()>;
}

/// Postgres-backed account store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn legacy_saved_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT book_id FROM user_saved_books_legacy WHERE user_id = $1 ORDER BY position, book_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        preferred_language: &str,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, preferred_language)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(preferred_language)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn all(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn favorite_genres(&self, user_id: i64) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            r#"
            SELECT g.id, g.name FROM genres g
            JOIN user_favorite_genres ufg ON ufg.genre_id = g.id
            WHERE ufg.user_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn set_favorite_genres(&self, user_id: i64, genre_ids: &[i64]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_favorite_genres WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_favorite_genres (user_id, genre_id)
            SELECT $1, genre_id FROM UNNEST($2::BIGINT[]) AS genre_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(genre_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_favorite_genres (user_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(genre_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_favorite_genre(&self, user_id: i64, genre_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM user_favorite_genres WHERE user_id = $1 AND genre_id = $2")
            .bind(user_id)
            .bind(genre_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn saved_book_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let stored: Option<sqlx::types::Json<Vec<i64>>> =
            sqlx::query_scalar("SELECT saved_book_ids FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let stored = stored.map(|json| json.0).unwrap_or_default();
        if !stored.is_empty() {
            return Ok(stored);
        }

        // Canonical list is empty: fold in the legacy relation, if any.
        let legacy = self.legacy_saved_ids(user_id).await?;
        if !legacy.is_empty() {
            self.set_saved_book_ids(user_id, &legacy).await?;
            tracing::info!(user_id, migrated = legacy.len(), "Migrated legacy saved books");
        }
        Ok(legacy)
    }

    async fn set_saved_book_ids(&self, user_id: i64, ids: &[i64]) -> AppResult<()> {
        sqlx::query("UPDATE users SET saved_book_ids = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(sqlx::types::Json(ids.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
