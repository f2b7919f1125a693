use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppResult,
    models::{Book, BookInput, Genre},
};

/// Filters for the catalog explorer
#[derive(Debug, Clone, Default)]
pub struct ExploreFilter {
    pub offset: i64,
    pub limit: i64,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub exclude_ids: Vec<i64>,
}

/// One page of catalog results
#[derive(Debug, Clone)]
pub struct ExplorePage {
    pub books: Vec<Book>,
    pub total_count: i64,
}

impl ExplorePage {
    pub fn has_more(&self, offset: i64, limit: i64) -> bool {
        offset + limit < self.total_count
    }
}

/// Catalog storage abstraction
///
/// The HTTP layer and the recommendation service only see this trait, so
/// tests can substitute an in-memory implementation for Postgres.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books whose id is not in `exclude`, in ascending id order
    async fn all_excluding(&self, exclude: &[i64]) -> AppResult<Vec<Book>>;

    /// Books matching the given ids, in ascending id order
    async fn by_ids(&self, ids: &[i64]) -> AppResult<Vec<Book>>;

    async fn by_id(&self, id: i64) -> AppResult<Option<Book>>;

    async fn all(&self) -> AppResult<Vec<Book>>;

    async fn count(&self) -> AppResult<i64>;

    /// Prefix match on title or author
    async fn search_prefix(&self, query: &str) -> AppResult<Vec<Book>>;

    async fn explore(&self, filter: &ExploreFilter) -> AppResult<ExplorePage>;

    /// Admin listing: substring search over title/author/genres/isbn
    async fn admin_search(&self, query: &str, offset: i64, limit: i64) -> AppResult<ExplorePage>;

    async fn insert(&self, input: &BookInput) -> AppResult<Book>;

    async fn update(&self, id: i64, input: &BookInput) -> AppResult<Option<Book>>;

    async fn delete(&self, id: i64) -> AppResult<bool>;

    /// Insert or update keyed on isbn; returns true when a row was created
    async fn upsert_by_isbn(&self, input: &BookInput) -> AppResult<bool>;

    async fn distinct_authors(&self, limit: i64) -> AppResult<Vec<String>>;

    async fn distinct_languages(&self) -> AppResult<Vec<String>>;

    /// Lists genres ordered by name; a non-empty `query` filters by substring
    async fn list_genres(&self, query: &str) -> AppResult<Vec<Genre>>;

    async fn genre_by_id(&self, id: i64) -> AppResult<Option<Genre>>;

    async fn genre_by_name(&self, name: &str) -> AppResult<Option<Genre>>;

    /// Returns the genre and whether it was newly created
    async fn get_or_create_genre(&self, name: &str) -> AppResult<(Genre, bool)>;

    async fn rename_genre(&self, id: i64, name: &str) -> AppResult<Option<Genre>>;

    async fn delete_genre(&self, id: i64) -> AppResult<bool>;
}

/// Postgres-backed catalog store
#[derive(Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_explore_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ExploreFilter) {
        if !filter.exclude_ids.is_empty() {
            qb.push(" AND NOT (id = ANY(");
            qb.push_bind(filter.exclude_ids.clone());
            qb.push("))");
        }
        if let Some(author) = &filter.author {
            qb.push(" AND author ILIKE ");
            qb.push_bind(format!("%{}%", author));
        }
        if let Some(isbn) = &filter.isbn {
            qb.push(" AND isbn ILIKE ");
            qb.push_bind(format!("%{}%", isbn));
        }
        if let Some(genre) = &filter.genre {
            qb.push(" AND genres::text ILIKE ");
            qb.push_bind(format!("%{}%", genre));
        }
        if let Some(year) = filter.published_year {
            qb.push(" AND EXTRACT(YEAR FROM publish_date)::INT = ");
            qb.push_bind(year);
        }
        if let Some(publisher) = &filter.publisher {
            qb.push(" AND publisher ILIKE ");
            qb.push_bind(format!("%{}%", publisher));
        }
        if let Some(language) = &filter.language {
            qb.push(" AND language ILIKE ");
            qb.push_bind(format!("%{}%", language));
        }
    }

    fn bind_book_fields<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        input: &'a BookInput,
    ) {
        let mut fields = qb.separated(", ");
        fields.push_bind(&input.title);
        fields.push_bind(&input.author);
        fields.push_bind(&input.isbn);
        fields.push_bind(&input.description);
        fields.push_bind(&input.cover_image);
        fields.push_bind(input.publish_date);
        fields.push_bind(input.rating);
        fields.push_bind(input.liked_percentage);
        fields.push_bind(sqlx::types::Json(input.genres.clone()));
        fields.push_bind(&input.language);
        fields.push_bind(input.page_count);
        fields.push_bind(input.is_free);
        fields.push_bind(&input.publisher);
        fields.push_bind(&input.buy_now_url);
        fields.push_bind(&input.preview_url);
        fields.push_bind(&input.download_url);
    }

    async fn insert_row(&self, input: &BookInput) -> AppResult<Book> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO books (title, author, isbn, description, cover_image, publish_date, \
             rating, liked_percentage, genres, language, page_count, is_free, publisher, \
             buy_now_url, preview_url, download_url) VALUES (",
        );
        Self::bind_book_fields(&mut qb, input);
        qb.push(") RETURNING *");

        let book = qb.build_query_as::<Book>().fetch_one(&self.pool).await?;
        Ok(book)
    }

    async fn update_row(&self, id: i64, input: &BookInput) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $2, author = $3, isbn = $4, description = $5, cover_image = $6,
                publish_date = $7, rating = $8, liked_percentage = $9, genres = $10,
                language = $11, page_count = $12, is_free = $13, publisher = $14,
                buy_now_url = $15, preview_url = $16, download_url = $17,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.author)
        .bind(&input.isbn)
        .bind(&input.description)
        .bind(&input.cover_image)
        .bind(input.publish_date)
        .bind(input.rating)
        .bind(input.liked_percentage)
        .bind(sqlx::types::Json(input.genres.clone()))
        .bind(&input.language)
        .bind(input.page_count)
        .bind(input.is_free)
        .bind(&input.publisher)
        .bind(&input.buy_now_url)
        .bind(&input.preview_url)
        .bind(&input.download_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn all_excluding(&self, exclude: &[i64]) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE NOT (id = ANY($1)) ORDER BY id",
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn by_ids(&self, ids: &[i64]) -> AppResult<Vec<Book>> {
        let books =
            sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1) ORDER BY id")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(books)
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn search_prefix(&self, query: &str) -> AppResult<Vec<Book>> {
        let pattern = format!("{}%", query);
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE title ILIKE $1 OR author ILIKE $1 ORDER BY id",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn explore(&self, filter: &ExploreFilter) -> AppResult<ExplorePage> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM books WHERE TRUE");
        Self::push_explore_filters(&mut count_qb, filter);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT * FROM books WHERE TRUE");
        Self::push_explore_filters(&mut qb, filter);
        qb.push(" ORDER BY id OFFSET ");
        qb.push_bind(filter.offset);
        qb.push(" LIMIT ");
        qb.push_bind(filter.limit);

        let books = qb.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok(ExplorePage { books, total_count })
    }

    async fn admin_search(&self, query: &str, offset: i64, limit: i64) -> AppResult<ExplorePage> {
        let prefix = format!("{}%", query);
        let substring = format!("%{}%", query);

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE title ILIKE $1 OR author ILIKE $1 OR genres::text ILIKE $2 OR isbn ILIKE $2
            "#,
        )
        .bind(&prefix)
        .bind(&substring)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1 OR genres::text ILIKE $2 OR isbn ILIKE $2
            ORDER BY id OFFSET $3 LIMIT $4
            "#,
        )
        .bind(&prefix)
        .bind(&substring)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ExplorePage { books, total_count })
    }

    async fn insert(&self, input: &BookInput) -> AppResult<Book> {
        self.insert_row(input).await
    }

    async fn update(&self, id: i64, input: &BookInput) -> AppResult<Option<Book>> {
        self.update_row(id, input).await
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_by_isbn(&self, input: &BookInput) -> AppResult<bool> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM books WHERE isbn = $1")
            .bind(&input.isbn)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(id) => {
                self.update_row(id, input).await?;
                Ok(false)
            }
            None => {
                self.insert_row(input).await?;
                Ok(true)
            }
        }
    }

    async fn distinct_authors(&self, limit: i64) -> AppResult<Vec<String>> {
        let authors = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT author FROM books WHERE author <> '' ORDER BY author LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn distinct_languages(&self) -> AppResult<Vec<String>> {
        let languages = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT language FROM books WHERE language <> '' ORDER BY language",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(languages)
    }

    async fn list_genres(&self, query: &str) -> AppResult<Vec<Genre>> {
        let genres = if query.is_empty() {
            sqlx::query_as::<_, Genre>("SELECT * FROM genres ORDER BY name")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE name ILIKE $1 ORDER BY name")
                .bind(format!("%{}%", query))
                .fetch_all(&self.pool)
                .await?
        };
        Ok(genres)
    }

    async fn genre_by_id(&self, id: i64) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn get_or_create_genre(&self, name: &str) -> AppResult<(Genre, bool)> {
        let inserted = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING *",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(genre) = inserted {
            return Ok((genre, true));
        }

        let genre = sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok((genre, false))
    }

    async fn rename_genre(&self, id: i64, name: &str) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>(
            "UPDATE genres SET name = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(genre)
    }

    async fn delete_genre(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
