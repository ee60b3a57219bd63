use super::core::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::index::{index_insert_all, index_remove_all};
use crate::query::telemetry;
use crate::types::{DocumentId, ID_FIELD};
use bson::Document as BsonDocument;

/// `_id` is immutable: a replacement body always carries the current one.
fn keep_id_field(current: &BsonDocument, next: &mut BsonDocument) {
    if let Some(id) = current.get(ID_FIELD)
        && next.get(ID_FIELD) != Some(id)
    {
        next.insert(ID_FIELD, id.clone());
    }
}

impl Collection {
    /// # Errors
    /// Returns `DbError::DuplicateId` when a stored document already has the same `_id`.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId, DbError> {
        let _guard = self.build_lock.read();
        let doc_id = document.id.clone();
        let mut store = self.store.write();
        if store.holds_id_field(&document.data) {
            let dup = document.data.get(ID_FIELD).map(ToString::to_string).unwrap_or_default();
            log::warn!("rejected insert into {}: duplicate _id {dup}", self.name_str());
            return Err(DbError::DuplicateId(dup));
        }
        index_insert_all(&mut self.indexes.write(), &document.data, &doc_id);
        store.push(document);
        telemetry::log_audit("insert", self.name_str(), &doc_id.to_string());
        Ok(doc_id)
    }

    /// Inserts every document in order. Ids come back in the same order.
    ///
    /// # Errors
    /// Stops at the first duplicate `_id`; documents before it stay inserted.
    pub fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<DocumentId>, DbError> {
        documents.into_iter().map(|d| self.insert_document(d)).collect()
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.store.read().get(id).cloned()
    }

    /// Replaces the body of `id`, keeping its identity and `_id`. Returns `false`
    /// when the id is unknown.
    pub fn update_document(&self, id: &DocumentId, mut new_data: BsonDocument) -> bool {
        let _guard = self.build_lock.read();
        let mut store = self.store.write();
        let Some(current) = store.get_mut(id) else {
            return false;
        };
        keep_id_field(&current.data, &mut new_data);
        let mut idx = self.indexes.write();
        index_remove_all(&mut idx, &current.data, id);
        current.update(new_data);
        index_insert_all(&mut idx, &current.data, id);
        telemetry::log_audit("update", self.name_str(), &id.to_string());
        true
    }

    /// Edits the live body of `id` while holding the write lock, so nothing can
    /// change it between inspection and write. `edit` works on a copy and returns
    /// `None` to leave the document alone or `Some(changed)`.
    ///
    /// Returns `None` when the id is unknown or `edit` declined.
    pub fn edit_document(
        &self,
        id: &DocumentId,
        edit: impl FnOnce(&mut BsonDocument) -> Option<bool>,
    ) -> Option<bool> {
        let _guard = self.build_lock.read();
        let mut store = self.store.write();
        let current = store.get_mut(id)?;
        let mut draft = current.data.clone();
        let changed = edit(&mut draft)?;
        if changed {
            keep_id_field(&current.data, &mut draft);
            let mut idx = self.indexes.write();
            index_remove_all(&mut idx, &current.data, id);
            current.update(draft);
            index_insert_all(&mut idx, &current.data, id);
            telemetry::log_audit("update", self.name_str(), &id.to_string());
        }
        Some(changed)
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        self.delete_document_if(id, |_| true)
    }

    /// Deletes `id` only if `accept` accepts its live body; checked under the write lock.
    pub fn delete_document_if(&self, id: &DocumentId, accept: impl FnOnce(&BsonDocument) -> bool) -> bool {
        let _guard = self.build_lock.read();
        let mut store = self.store.write();
        if !store.get(id).is_some_and(|d| accept(&d.data)) {
            return false;
        }
        let Some(old) = store.remove(id) else {
            return false;
        };
        index_remove_all(&mut self.indexes.write(), &old.data, id);
        telemetry::log_audit("delete", self.name_str(), &id.to_string());
        true
    }

    /// Clones every document in natural order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.store.read().docs.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reorders ids (e.g. index scan output) into natural order; unknown ids are dropped.
    pub fn sort_natural(&self, ids: &mut Vec<DocumentId>) {
        let store = self.store.read();
        ids.retain(|id| store.seq_of.contains_key(id));
        ids.sort_by_key(|id| store.seq_of.get(id).copied().unwrap_or(u64::MAX));
        ids.dedup();
    }
}
