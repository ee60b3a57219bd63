use crate::types::{DocumentId, ID_FIELD};
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored document: the BSON body plus engine-side bookkeeping.
///
/// The body always carries an `_id` field. When the caller does not supply one,
/// the string form of the assigned [`DocumentId`] is used. A caller `_id` is kept
/// as is and the [`DocumentId`] stays internal; the collection refuses a second
/// document with the same body `_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(mut data: BsonDocument) -> Self {
        let id = DocumentId::new();
        if !data.contains_key(ID_FIELD) {
            // keep `_id` first, the way the server lays documents out
            let mut with_id = BsonDocument::new();
            with_id.insert(ID_FIELD, Bson::String(id.to_string()));
            for (k, v) in data {
                with_id.insert(k, v);
            }
            data = with_id;
        }
        Self { id, data, metadata: Metadata::new() }
    }

    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}
