use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    db::{BookStore, UserStore},
    error::AppResult,
    models::{Book, User},
};

/// Scoring weights. Fixed, not configurable; they sum to 1.0.
const FAVORITE_GENRE_WEIGHT: f64 = 0.40;
const SAVED_GENRE_WEIGHT: f64 = 0.20;
const AUTHOR_MATCH_WEIGHT: f64 = 0.15;
const RATING_WEIGHT: f64 = 0.15;
const LIKED_WEIGHT: f64 = 0.05;
const LANGUAGE_MATCH_WEIGHT: f64 = 0.05;

pub const DEFAULT_LIMIT: usize = 4;
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 24;

/// Per-candidate signals extracted from a catalog row
#[derive(Debug, Clone)]
pub struct BookSignal {
    pub id: i64,
    pub genres: HashSet<String>,
    pub author: String,
    pub rating: f64,
    pub liked_percentage: f64,
    pub language: String,
}

impl BookSignal {
    pub fn from_book(book: &Book) -> Self {
        Self {
            id: book.id,
            genres: book.genre_names().into_iter().collect(),
            author: book.author.clone(),
            rating: book.rating,
            liked_percentage: book.liked_percentage,
            language: book.language.clone(),
        }
    }
}

/// A user's preference signals, assembled fresh for each scoring call
#[derive(Debug, Clone, Default)]
pub struct UserSignal {
    pub favorite_genres: HashSet<String>,
    pub saved_ids: HashSet<i64>,
    pub saved_authors: HashSet<String>,
    pub saved_genres: HashSet<String>,
    pub preferred_language: String,
}

impl UserSignal {
    /// Derives secondary signals (saved authors, saved-genre union) from the
    /// resolved saved books.
    pub fn new(
        favorite_genres: HashSet<String>,
        preferred_language: &str,
        saved_ids: &[i64],
        saved_books: &[Book],
    ) -> Self {
        let saved_authors = saved_books
            .iter()
            .filter(|b| !b.author.is_empty())
            .map(|b| b.author.clone())
            .collect();
        let saved_genres = saved_books
            .iter()
            .flat_map(|b| b.genre_names())
            .collect();

        Self {
            favorite_genres,
            saved_ids: saved_ids.iter().copied().collect(),
            saved_authors,
            saved_genres,
            preferred_language: preferred_language.trim().to_lowercase(),
        }
    }

    /// A cold-start user carries no signal at all
    fn is_cold_start(&self) -> bool {
        self.favorite_genres.is_empty() && self.saved_ids.is_empty()
    }
}

/// Jaccard similarity of two sets; 0.0 when both are empty
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Blends the six sub-scores into one value in [0, 1]
fn score(user: &UserSignal, book: &BookSignal) -> f64 {
    let fav_genre_sim = if user.favorite_genres.is_empty() {
        0.0
    } else {
        jaccard(&user.favorite_genres, &book.genres)
    };
    let saved_genre_sim = if user.saved_genres.is_empty() {
        0.0
    } else {
        jaccard(&user.saved_genres, &book.genres)
    };
    let author_match = if !book.author.is_empty() && user.saved_authors.contains(&book.author) {
        1.0
    } else {
        0.0
    };
    let rating_norm = clamp01(book.rating / 5.0);
    let liked_norm = clamp01(book.liked_percentage / 100.0);
    let lang_match = if !user.preferred_language.is_empty()
        && book.language.trim().to_lowercase() == user.preferred_language
    {
        1.0
    } else {
        0.0
    };

    FAVORITE_GENRE_WEIGHT * fav_genre_sim
        + SAVED_GENRE_WEIGHT * saved_genre_sim
        + AUTHOR_MATCH_WEIGHT * author_match
        + RATING_WEIGHT * rating_norm
        + LIKED_WEIGHT * liked_norm
        + LANGUAGE_MATCH_WEIGHT * lang_match
}

/// Coerces a raw `limit` query value into the allowed range
///
/// Missing or non-numeric input falls back to the default; numeric input is
/// clamped into `[MIN_LIMIT, MAX_LIMIT]`. Never fails the request.
pub fn clamp_limit(raw: Option<&str>) -> usize {
    let limit = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT as i64);
    limit.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as usize
}

/// Sort key used for the cold-start and backfill rankings
fn by_rating_then_liked(a: &BookSignal, b: &BookSignal) -> std::cmp::Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then(b.liked_percentage.total_cmp(&a.liked_percentage))
}

/// Ranks catalog entries for a user and returns up to `limit` book ids
///
/// Pure function of its inputs: for a fixed catalog order and user signal
/// the output is identical across calls. Saved books never appear in the
/// output regardless of score.
pub fn recommend(user: &UserSignal, catalog: &[BookSignal], limit: usize) -> Vec<i64> {
    let candidates: Vec<&BookSignal> = catalog
        .iter()
        .filter(|b| !user.saved_ids.contains(&b.id))
        .collect();

    // No signal at all: rank by quality instead of an all-zero score sort.
    if user.is_cold_start() {
        let mut ranked = candidates;
        ranked.sort_by(|a, b| by_rating_then_liked(a, b));
        return ranked.into_iter().take(limit).map(|b| b.id).collect();
    }

    let mut scored: Vec<(f64, &BookSignal)> =
        candidates.iter().map(|b| (score(user, b), *b)).collect();
    // Raw rating is the tie-break, not the normalized form.
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).reverse().then(b.1.rating.total_cmp(&a.1.rating)));

    let mut picked: Vec<i64> = scored.iter().take(limit).map(|(_, b)| b.id).collect();

    // Tiny catalog: pad with remaining candidates by quality, no duplicates.
    if picked.len() < limit {
        let chosen: HashSet<i64> = picked.iter().copied().collect();
        let mut fillers: Vec<&BookSignal> = candidates
            .iter()
            .filter(|b| !chosen.contains(&b.id))
            .copied()
            .collect();
        fillers.sort_by(|a, b| by_rating_then_liked(a, b));
        picked.extend(fillers.into_iter().take(limit - picked.len()).map(|b| b.id));
    }

    picked
}

/// Assembles user signals from the stores and runs the scorer
pub struct RecommendationService {
    books: Arc<dyn BookStore>,
    users: Arc<dyn UserStore>,
}

impl RecommendationService {
    pub fn new(books: Arc<dyn BookStore>, users: Arc<dyn UserStore>) -> Self {
        Self { books, users }
    }

    /// Recommends up to `limit` books the user has not saved
    ///
    /// Secondary signals are recomputed from the catalog on every call;
    /// nothing here is cached.
    pub async fn recommend_for_user(&self, user: &User, limit: usize) -> AppResult<Vec<Book>> {
        let favorite_genres: HashSet<String> = self
            .users
            .favorite_genres(user.id)
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect();

        let saved_ids = self.users.saved_book_ids(user.id).await?;
        let saved_books = if saved_ids.is_empty() {
            Vec::new()
        } else {
            self.books.by_ids(&saved_ids).await?
        };

        let signal = UserSignal::new(
            favorite_genres,
            &user.preferred_language,
            &saved_ids,
            &saved_books,
        );

        let catalog = self.books.all_excluding(&saved_ids).await?;
        let signals: Vec<BookSignal> = catalog.iter().map(BookSignal::from_book).collect();

        let ranked = recommend(&signal, &signals, limit);
        tracing::debug!(
            user_id = user.id,
            candidates = signals.len(),
            returned = ranked.len(),
            "Computed recommendations"
        );

        let by_id: HashMap<i64, Book> = catalog.into_iter().map(|b| (b.id, b)).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|id| by_id.get(&id).cloned())
            .collect())
    }
}
