mod book;
mod genre;
mod user;

pub use book::{Book, BookInput};
pub use genre::Genre;
pub use user::{User, UserDetail};
