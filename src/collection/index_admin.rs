use super::core::Collection;
use crate::errors::DbError;
use crate::index::IndexSpec;
use bson::Document as BsonDocument;

impl Collection {
    /// Creates an index from a key pattern and builds it over the current documents.
    /// Creating an index that already exists is a no-op; the name is returned either way.
    ///
    /// # Errors
    /// Propagates key-pattern validation failures from [`IndexSpec::from_keys`].
    pub fn create_index(&self, keys: &BsonDocument) -> Result<String, DbError> {
        let spec = IndexSpec::from_keys(keys)?;
        let name = spec.name.clone();
        let _wguard = self.build_lock.write();
        let store = self.store.read();
        let mut mgr = self.indexes.write();
        if !mgr.create_index(spec)? {
            log::debug!("index {name} already present on {}", self.name_str());
            return Ok(name);
        }
        // offline build over the current documents
        let start = std::time::Instant::now();
        if let Some(idx) = mgr.indexes.get_mut(&name) {
            for doc in store.docs.values() {
                idx.insert(&doc.data, &doc.id);
            }
            idx.stats.build_time_ms = start.elapsed().as_millis();
        }
        log::info!("created index {name} on {}", self.name_str());
        Ok(name)
    }

    pub fn drop_index(&self, name: &str) -> bool {
        let _wguard = self.build_lock.write();
        self.indexes.write().drop_index(name)
    }

    #[must_use]
    pub fn list_indexes(&self) -> Vec<IndexSpec> {
        self.indexes.read().descriptors()
    }
}
