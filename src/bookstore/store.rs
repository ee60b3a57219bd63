use bson::{Document as BsonDocument, doc};
use std::sync::Arc;

use super::model::{AuthorTotal, Book, DecadeCount, GenreAveragePrice, PricedTitle, decode_all};
use super::{pipelines, seed};
use crate::Database;
use crate::collection::Collection;
use crate::errors::DbError;
use crate::query::{
    DeleteReport, Explain, Filter, FindOptions, Order, Projection, SortSpec, UpdateDoc, UpdateReport,
};
use crate::types::DocumentId;

pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// The bookstore statements, bound to one collection of a [`Database`].
#[derive(Debug, Clone)]
pub struct BookStore {
    db: Database,
    collection: String,
    page_size: usize,
}

impl BookStore {
    #[must_use]
    pub fn new(db: Database, collection: impl Into<String>, page_size: usize) -> Self {
        Self { db, collection: collection.into(), page_size: page_size.max(1) }
    }

    /// A fresh in-memory `plp_bookstore.books` store with the default page size.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Database::new(DEFAULT_DATABASE), DEFAULT_COLLECTION, DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Ensures the collection exists; safe to call repeatedly.
    pub fn provision(&self) -> Arc<Collection> {
        self.db.create_collection(&self.collection)
    }

    /// Bulk-inserts the given books in one request.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn insert_books(&self, books: &[Book]) -> Result<Vec<DocumentId>, DbError> {
        self.db.insert_many(&self.collection, books.iter().map(Book::to_document).collect())
    }

    /// Inserts the ten sample books.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn seed(&self) -> Result<Vec<DocumentId>, DbError> {
        let ids = self.insert_books(&seed::sample_books())?;
        log::info!("seeded {} books into {}", ids.len(), self.db.namespace(&self.collection));
        Ok(ids)
    }

    /// Runs a filter document and returns the raw rows.
    ///
    /// # Errors
    /// Returns `DbError::QueryError` for a malformed filter.
    pub fn find_raw(&self, filter: &BsonDocument, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        let filter = Filter::try_from(filter)?;
        Ok(self.db.find(&self.collection, &filter, opts)?.to_vec())
    }

    fn find_books(&self, filter: &BsonDocument, opts: &FindOptions) -> Result<Vec<Book>, DbError> {
        decode_all(&self.find_raw(filter, opts)?)
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn count(&self, filter: &BsonDocument) -> Result<usize, DbError> {
        self.db.count(&self.collection, &Filter::try_from(filter)?)
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn find_by_genre(&self, genre: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&doc! { "genre": genre }, &FindOptions::default())
    }

    /// Books published strictly after `year`.
    ///
    /// # Errors
    /// Propagates engine and decode errors.
    pub fn published_after(&self, year: i32) -> Result<Vec<Book>, DbError> {
        self.find_books(&doc! { "published_year": { "$gt": year } }, &FindOptions::default())
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn find_by_author(&self, author: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&doc! { "author": author }, &FindOptions::default())
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn find_by_title(&self, title: &str) -> Result<Option<Book>, DbError> {
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        Ok(self.find_books(&doc! { "title": title }, &opts)?.into_iter().next())
    }

    /// Sets the price of the first book with this title.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn update_price(&self, title: &str, price: f64) -> Result<UpdateReport, DbError> {
        self.db.update_one(&self.collection, &Filter::eq("title", title), &UpdateDoc::set("price", price))
    }

    /// Removes the first book with this title.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn delete_by_title(&self, title: &str) -> Result<DeleteReport, DbError> {
        self.db.delete_one(&self.collection, &Filter::eq("title", title))
    }

    /// In-stock books published strictly after `year`.
    ///
    /// # Errors
    /// Propagates engine and decode errors.
    pub fn in_stock_published_after(&self, year: i32) -> Result<Vec<Book>, DbError> {
        self.find_books(
            &doc! { "in_stock": true, "published_year": { "$gt": year } },
            &FindOptions::default(),
        )
    }

    /// Title, author and price of every book, without `_id`.
    ///
    /// # Errors
    /// Propagates engine and decode errors.
    pub fn priced_titles(&self) -> Result<Vec<PricedTitle>, DbError> {
        let projection = Projection::try_from(&doc! { "_id": 0, "title": 1, "author": 1, "price": 1 })?;
        let opts = FindOptions { projection: Some(projection), ..FindOptions::default() };
        decode_all(&self.find_raw(&doc! {}, &opts)?)
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn sorted_by_price(&self, order: Order) -> Result<Vec<Book>, DbError> {
        let opts = FindOptions {
            sort: Some(vec![SortSpec { field: "price".into(), order }]),
            ..FindOptions::default()
        };
        self.find_books(&doc! {}, &opts)
    }

    /// Page `n` (1-based) in natural order: skip `(n-1) * page_size`, take `page_size`.
    ///
    /// # Errors
    /// Returns `DbError::QueryError` for page 0.
    pub fn page(&self, n: usize) -> Result<Vec<Book>, DbError> {
        self.page_sorted(n, None)
    }

    /// Like [`BookStore::page`] with an optional sort layered underneath.
    ///
    /// # Errors
    /// Returns `DbError::QueryError` for page 0.
    pub fn page_sorted(&self, n: usize, sort: Option<Vec<SortSpec>>) -> Result<Vec<Book>, DbError> {
        let Some(index) = n.checked_sub(1) else {
            return Err(DbError::QueryError("pages are numbered from 1".into()));
        };
        let skip = index.saturating_mul(self.page_size);
        let opts = FindOptions { sort, limit: Some(self.page_size), skip: Some(skip), ..FindOptions::default() };
        self.find_books(&doc! {}, &opts)
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>, DbError> {
        decode_all(&self.db.aggregate(&self.collection, &pipelines::average_price_by_genre())?)
    }

    /// `None` for an empty collection.
    ///
    /// # Errors
    /// Propagates engine and decode errors.
    pub fn most_prolific_author(&self) -> Result<Option<AuthorTotal>, DbError> {
        let rows = self.db.aggregate(&self.collection, &pipelines::most_prolific_author())?;
        rows.first().map(AuthorTotal::try_from).transpose()
    }

    /// # Errors
    /// Propagates engine and decode errors.
    pub fn count_by_decade(&self) -> Result<Vec<DecadeCount>, DbError> {
        decode_all(&self.db.aggregate(&self.collection, &pipelines::count_by_decade())?)
    }

    /// Creates `title_1` and `author_1_published_year_1`; returns their names.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn create_indexes(&self) -> Result<Vec<String>, DbError> {
        Ok(vec![
            self.db.create_index(&self.collection, &pipelines::title_index())?,
            self.db.create_index(&self.collection, &pipelines::author_year_index())?,
        ])
    }

    /// # Errors
    /// Returns `DbError::QueryError` for a malformed filter.
    pub fn explain(&self, filter: &BsonDocument) -> Result<Explain, DbError> {
        self.db.explain(&self.collection, filter)
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn explain_title(&self, title: &str) -> Result<Explain, DbError> {
        self.explain(&doc! { "title": title })
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` when the collection was not provisioned.
    pub fn explain_author_year(&self, author: &str, year: i32) -> Result<Explain, DbError> {
        self.explain(&doc! { "author": author, "published_year": year })
    }
}
