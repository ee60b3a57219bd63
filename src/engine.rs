use crate::collection::Collection;
use crate::errors::DbError;
use crate::types::CollectionName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process document engine: a set of named collections held in memory.
#[derive(Debug, Default)]
pub struct Engine {
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it when absent. An existing
    /// collection is returned unchanged.
    pub fn create_collection(&self, name: impl Into<String>) -> Arc<Collection> {
        let name = name.into();
        let mut cols = self.collections.write();
        if let Some(existing) = cols.get(&name) {
            log::debug!("collection {name} already exists");
            return existing.clone();
        }
        let col = Arc::new(Collection::new(name.clone()));
        cols.insert(name.clone(), col.clone());
        log::info!("created collection {name}");
        col
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Like [`Engine::get_collection`] but reports a missing collection as an error.
    ///
    /// # Errors
    /// Returns `DbError::NoSuchCollection` when `name` is unknown.
    pub fn require_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use bson::doc;

    #[test]
    fn create_is_idempotent() {
        let e = Engine::new();
        let a = e.create_collection("books");
        a.insert_document(Document::new(doc! {"title": "1984"})).unwrap();
        let b = e.create_collection("books");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.len(), 1);
        assert_eq!(e.list_collection_names(), vec!["books"]);
    }

    #[test]
    fn missing_collection_is_an_error() {
        let e = Engine::new();
        assert!(matches!(e.require_collection("nope"), Err(DbError::NoSuchCollection(_))));
        assert!(!e.delete_collection("nope"));
    }
}
