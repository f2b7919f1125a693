use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::BookInput,
};

/// A row that could not be imported, with its 1-based line number
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// Splits one CSV line, honoring double-quoted fields and `""` escapes
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn non_empty_lines(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l))
        .collect()
}

/// Parses a genre CSV body
///
/// Accepts a `name` or `genre` header column; without a recognizable header
/// every non-empty line's first field is treated as a genre name.
pub fn parse_genre_csv(text: &str) -> AppResult<(Vec<String>, Vec<RowError>)> {
    let lines = non_empty_lines(text);
    if lines.is_empty() {
        return Err(AppError::InvalidInput("Empty file".to_string()));
    }

    let header = split_line(lines[0].1);
    let name_col = header
        .iter()
        .position(|h| matches!(h.to_lowercase().as_str(), "name" | "genre"));

    let mut names = Vec::new();
    let mut errors = Vec::new();

    match name_col {
        Some(col) => {
            for (row, line) in lines.into_iter().skip(1) {
                let fields = split_line(line);
                match fields.get(col).filter(|n| !n.is_empty()) {
                    Some(name) => names.push(name.clone()),
                    None => errors.push(RowError {
                        row,
                        error: "Missing name".to_string(),
                    }),
                }
            }
        }
        None => {
            for (row, line) in lines {
                let fields = split_line(line);
                match fields.first().filter(|n| !n.is_empty()) {
                    Some(name) => names.push(name.clone()),
                    None => errors.push(RowError {
                        row,
                        error: "Empty line".to_string(),
                    }),
                }
            }
        }
    }

    Ok((names, errors))
}

fn to_f64(raw: Option<&String>) -> f64 {
    raw.map(|s| s.trim_end_matches('%'))
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0.0)
}

fn to_i32(raw: Option<&String>) -> i32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

fn to_bool(raw: Option<&String>) -> bool {
    raw.map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn parse_date(raw: Option<&String>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Prepends `https://` when the value has no scheme
fn ensure_url(raw: Option<&String>) -> String {
    let url = raw.map(|s| s.trim()).unwrap_or_default();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Parses a book CSV body into inputs plus per-row errors
///
/// Requires `title`, `author`, and `isbn` columns. All other columns are
/// best-effort: unparseable numbers and dates fall back to defaults rather
/// than failing the row, and a missing ISBN skips just that row.
pub fn parse_books_csv(text: &str) -> AppResult<(Vec<BookInput>, Vec<RowError>)> {
    let lines = non_empty_lines(text);
    if lines.is_empty() {
        return Err(AppError::InvalidInput("Empty file".to_string()));
    }

    let header: Vec<String> = split_line(lines[0].1)
        .into_iter()
        .map(|h| h.to_lowercase())
        .collect();

    let missing: Vec<&str> = ["title", "author", "isbn"]
        .into_iter()
        .filter(|required| !header.iter().any(|h| h.as_str() == *required))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let col = |name: &str| header.iter().position(|h| h.as_str() == name);
    let get = |fields: &[String], idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| fields.get(i)).cloned().filter(|v| !v.is_empty())
    };

    let title_col = col("title");
    let author_col = col("author");
    let isbn_col = col("isbn");
    let description_col = col("description");
    let cover_col = col("cover_image");
    let date_col = col("publish_date");
    let rating_col = col("rating");
    let liked_col = col("liked_percentage");
    let genres_col = col("genres");
    let language_col = col("language");
    let pages_col = col("page_count");
    let free_col = col("is_free");
    let publisher_col = col("publisher");
    let buy_col = col("buy_now_url");
    let preview_col = col("preview_url");
    let download_col = col("download_url");

    let mut inputs = Vec::new();
    let mut errors = Vec::new();

    for (row, line) in lines.into_iter().skip(1) {
        let fields = split_line(line);

        let isbn = match get(&fields, isbn_col) {
            Some(isbn) => isbn,
            None => {
                errors.push(RowError {
                    row,
                    error: "Missing ISBN".to_string(),
                });
                continue;
            }
        };

        let genres = get(&fields, genres_col)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        inputs.push(BookInput {
            title: get(&fields, title_col).unwrap_or_default(),
            author: get(&fields, author_col).unwrap_or_default(),
            isbn,
            description: get(&fields, description_col).unwrap_or_default(),
            cover_image: ensure_url(get(&fields, cover_col).as_ref()),
            publish_date: parse_date(get(&fields, date_col).as_ref()),
            rating: to_f64(get(&fields, rating_col).as_ref()),
            liked_percentage: to_f64(get(&fields, liked_col).as_ref()),
            genres,
            language: get(&fields, language_col).unwrap_or_else(|| "English".to_string()),
            page_count: to_i32(get(&fields, pages_col).as_ref()),
            is_free: to_bool(get(&fields, free_col).as_ref()),
            publisher: get(&fields, publisher_col).unwrap_or_default(),
            buy_now_url: ensure_url(get(&fields, buy_col).as_ref()),
            preview_url: ensure_url(get(&fields, preview_col).as_ref()),
            download_url: ensure_url(get(&fields, download_col).as_ref()),
        });
    }

    Ok((inputs, errors))
}
