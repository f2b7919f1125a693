use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Book;

const TOP_GENRE_COUNT: usize = 5;
const TOP_RATED_COUNT: usize = 4;
const RECENT_WINDOW_DAYS: i64 = 30;

/// Aggregate numbers for the admin dashboard
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_books: usize,
    pub total_users: i64,
    pub books_added_today: usize,
    pub avg_rating: f64,
    pub most_popular_genres: Vec<String>,
    pub recent_searches: Vec<String>,
    pub top_rated_books: Vec<Book>,
}

/// Computes dashboard statistics over the full catalog snapshot
pub fn compute(books: &[Book], total_users: i64, now: DateTime<Utc>) -> DashboardStats {
    let today = now.date_naive();
    let books_added_today = books
        .iter()
        .filter(|b| b.created_at.date_naive() == today)
        .count();

    let avg_rating = if books.is_empty() {
        0.0
    } else {
        let sum: f64 = books.iter().map(|b| b.rating).sum();
        (sum / books.len() as f64 * 10.0).round() / 10.0
    };

    let mut genre_counts: HashMap<String, usize> = HashMap::new();
    for book in books {
        for genre in book.genre_names() {
            *genre_counts.entry(genre).or_default() += 1;
        }
    }
    let mut genre_ranking: Vec<(String, usize)> = genre_counts.into_iter().collect();
    genre_ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let most_popular_genres = genre_ranking
        .into_iter()
        .take(TOP_GENRE_COUNT)
        .map(|(name, _)| name)
        .collect();

    DashboardStats {
        total_books: books.len(),
        total_users,
        books_added_today,
        avg_rating,
        most_popular_genres,
        // Search terms are not tracked yet; the dashboard shows a fixed set.
        recent_searches: ["fantasy", "mystery", "sci-fi", "romance", "thriller"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        top_rated_books: top_rated_recent(books, now),
    }
}

/// Highest-rated books touched in the last 30 days, padded with the newest
/// catalog entries when fewer than four qualify
fn top_rated_recent(books: &[Book], now: DateTime<Utc>) -> Vec<Book> {
    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);

    let mut recent: Vec<&Book> = books.iter().filter(|b| b.updated_at >= cutoff).collect();
    recent.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(b.created_at.cmp(&a.created_at))
    });

    let mut top: Vec<Book> = recent.into_iter().take(TOP_RATED_COUNT).cloned().collect();

    if top.len() < TOP_RATED_COUNT {
        let picked: Vec<i64> = top.iter().map(|b| b.id).collect();
        let mut others: Vec<&Book> =
            books.iter().filter(|b| !picked.contains(&b.id)).collect();
        others.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        top.extend(
            others
                .into_iter()
                .take(TOP_RATED_COUNT - top.len())
                .cloned(),
        );
    }

    top
}
