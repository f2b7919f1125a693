pub mod books;
pub mod postgres;
pub mod users;

pub use books::{BookStore, ExploreFilter, ExplorePage, PgBookStore};
pub use users::{PgUserStore, UserStore};

#[cfg(test)]
pub use books::MockBookStore;
#[cfg(test)]
pub use users::MockUserStore;
