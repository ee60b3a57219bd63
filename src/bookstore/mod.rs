//! The `plp_bookstore` statements: the book model, its sample data and the
//! fixed queries, pipelines and indexes run against the `books` collection.

pub mod model;
pub mod pipelines;
pub mod script;
pub mod seed;
pub mod store;

pub use model::{AuthorTotal, Book, DecadeCount, GenreAveragePrice, PricedTitle};
pub use script::{ScriptReport, Step, run_script};
pub use seed::sample_books;
pub use store::{BookStore, DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_PAGE_SIZE};
