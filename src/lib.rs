pub mod aggregate;
pub mod bookstore;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod query;
pub mod types;
pub mod utils;

use crate::aggregate::Pipeline;
use crate::collection::Collection;
use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::index::IndexSpec;
use crate::query::{Cursor, DeleteReport, Explain, Filter, FindOptions, UpdateDoc, UpdateReport};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::sync::Arc;

/// Handle on one named database of an in-process [`Engine`].
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    engine: Arc<Engine>,
}

impl Database {
    /// Opens an empty in-memory database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_engine(name, Arc::new(Engine::new()))
    }

    #[must_use]
    pub fn with_engine(name: impl Into<String>, engine: Arc<Engine>) -> Self {
        Self { name: name.into(), engine }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `db.collection`, as reported in plan output.
    #[must_use]
    pub fn namespace(&self, collection: &str) -> String {
        format!("{}.{collection}", self.name)
    }

    /// Ensures the collection exists. Creating an existing collection is not an error.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.engine.create_collection(name)
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.engine.delete_collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.require_collection(name)
    }

    /// Inserts the documents in order; each gets a fresh `_id` unless it carries one.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist and
    /// `DbError::DuplicateId` at the first `_id` already stored.
    pub fn insert_many(
        &self,
        collection_name: &str,
        docs: Vec<BsonDocument>,
    ) -> Result<Vec<DocumentId>, DbError> {
        let col = self.collection(collection_name)?;
        col.insert_many(docs.into_iter().map(Document::new).collect())
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn find(
        &self,
        collection_name: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Cursor, DbError> {
        let col = self.collection(collection_name)?;
        Ok(crate::query::find_docs(&col, filter, opts))
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn count(&self, collection_name: &str, filter: &Filter) -> Result<usize, DbError> {
        let col = self.collection(collection_name)?;
        Ok(crate::query::count_docs(&col, filter))
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn update_one(
        &self,
        collection_name: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateReport, DbError> {
        let col = self.collection(collection_name)?;
        Ok(crate::query::update_one(&col, filter, update))
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn delete_one(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        let col = self.collection(collection_name)?;
        Ok(crate::query::delete_one(&col, filter))
    }

    /// Runs a pipeline over the collection in natural order.
    ///
    /// # Errors
    /// Returns `DbError::PipelineError` for a malformed pipeline, or
    /// `DbError::NoSuchCollection`.
    pub fn aggregate(
        &self,
        collection_name: &str,
        pipeline: &[BsonDocument],
    ) -> Result<Vec<BsonDocument>, DbError> {
        let col = self.collection(collection_name)?;
        let pipeline = Pipeline::parse(pipeline)?;
        let start = std::time::Instant::now();
        let input: Vec<BsonDocument> = col.get_all_documents().into_iter().map(|d| d.data).collect();
        let n_in = input.len();
        let out = pipeline.run(input);
        crate::query::telemetry::log_pipeline(
            col.name_str(),
            pipeline.stages.len(),
            n_in,
            out.len(),
            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        Ok(out)
    }

    /// Creates an index from a key pattern such as `{title: 1}` and returns its name.
    ///
    /// # Errors
    /// Returns `DbError::IndexError` for a malformed pattern, or `DbError::NoSuchCollection`.
    pub fn create_index(&self, collection_name: &str, keys: &BsonDocument) -> Result<String, DbError> {
        self.collection(collection_name)?.create_index(keys)
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn list_indexes(&self, collection_name: &str) -> Result<Vec<IndexSpec>, DbError> {
        Ok(self.collection(collection_name)?.list_indexes())
    }

    /// # Errors
    /// Returns `DbError::NoSuchCollection` if the collection does not exist.
    pub fn drop_index(&self, collection_name: &str, index: &str) -> Result<bool, DbError> {
        Ok(self.collection(collection_name)?.drop_index(index))
    }

    /// Runs the filter and returns the plan and scan statistics instead of rows.
    ///
    /// # Errors
    /// Returns `DbError::QueryError` for a malformed filter, or `DbError::NoSuchCollection`.
    pub fn explain(&self, collection_name: &str, filter: &BsonDocument) -> Result<Explain, DbError> {
        let col = self.collection(collection_name)?;
        let parsed = Filter::try_from(filter)?;
        Ok(crate::query::explain_find(&col, &self.namespace(collection_name), filter, &parsed))
    }
}
