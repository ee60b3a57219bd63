use crate::document::Document;
use crate::index::IndexManager;
use crate::query::bson_as_f64;
use crate::types::{DocumentId, ID_FIELD};
use bson::Document as BsonDocument;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Lookup key for a body's `_id`. Numbers share one form so that `1` and `1.0` collide.
pub(crate) fn id_key(data: &BsonDocument) -> Option<String> {
    let v = data.get(ID_FIELD)?;
    Some(bson_as_f64(v).map_or_else(|| v.to_string(), |n| format!("num:{n}")))
}

/// Documents of one collection in natural (insertion) order.
#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) docs: BTreeMap<u64, Document>,
    pub(crate) seq_of: HashMap<DocumentId, u64>,
    by_id_field: HashMap<String, u64>,
    next_seq: u64,
}

impl Store {
    pub(crate) fn push(&mut self, doc: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(doc.id.clone(), seq);
        if let Some(k) = id_key(&doc.data) {
            self.by_id_field.insert(k, seq);
        }
        self.docs.insert(seq, doc);
    }

    pub(crate) fn holds_id_field(&self, data: &BsonDocument) -> bool {
        id_key(data).is_some_and(|k| self.by_id_field.contains_key(&k))
    }

    pub(crate) fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.seq_of.get(id).and_then(|s| self.docs.get(s))
    }

    pub(crate) fn get_mut(&mut self, id: &DocumentId) -> Option<&mut Document> {
        let seq = *self.seq_of.get(id)?;
        self.docs.get_mut(&seq)
    }

    pub(crate) fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let seq = self.seq_of.remove(id)?;
        let doc = self.docs.remove(&seq)?;
        if let Some(k) = id_key(&doc.data) {
            self.by_id_field.remove(&k);
        }
        Some(doc)
    }
}

pub struct Collection {
    name: String,
    pub(crate) store: RwLock<Store>,
    pub indexes: RwLock<IndexManager>,
    pub(crate) build_lock: RwLock<()>,
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            store: RwLock::new(Store::default()),
            indexes: RwLock::new(IndexManager::new()),
            build_lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn name_str(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("len", &self.store.read().docs.len())
            .finish_non_exhaustive()
    }
}
