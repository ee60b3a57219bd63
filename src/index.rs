use crate::errors::DbError;
use crate::query::Order;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One component of an index key.
///
/// Variant order is the cross-type sort order of keys: missing/null first,
/// then numbers, strings and booleans. All numeric BSON types share one
/// representation so that int32 `1960` and double `1960.0` land on the same key.
/// `Other` collects every value with no scalar key (arrays, subdocuments, dates ...);
/// predicates never bound on it, so those entries are only reached by prefix scans.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKeyKind {
    Null,
    Num(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
    Other,
}

impl IndexKeyKind {
    const fn class(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Num(_) => 1,
            Self::Str(_) => 2,
            Self::Bool(_) => 3,
            Self::Other => 4,
        }
    }
}

/// Maps a predicate value to its key component. `None` means the value has no
/// scalar key (documents, arrays, binary ...) and cannot bound a scan.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn key_from_bson(v: Option<&Bson>) -> Option<IndexKeyKind> {
    match v {
        None | Some(Bson::Null) => Some(IndexKeyKind::Null),
        Some(Bson::String(s)) => Some(IndexKeyKind::Str(s.clone())),
        Some(Bson::Int32(i)) => Some(IndexKeyKind::Num(OrderedFloat(f64::from(*i)))),
        Some(Bson::Int64(i)) => Some(IndexKeyKind::Num(OrderedFloat(*i as f64))),
        Some(Bson::Double(f)) => Some(IndexKeyKind::Num(OrderedFloat(*f))),
        Some(Bson::Boolean(b)) => Some(IndexKeyKind::Bool(*b)),
        _ => None,
    }
}

/// Definition of an index: its name and ordered key pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<(String, Order)>,
}

impl IndexSpec {
    /// Builds a spec from a key pattern such as `{author: 1, published_year: 1}`.
    /// The generated name follows the `field_dir` convention, e.g. `author_1_published_year_1`.
    ///
    /// # Errors
    /// Returns `DbError::IndexError` for an empty pattern or a direction other than `1`/`-1`.
    pub fn from_keys(pattern: &BsonDocument) -> Result<Self, DbError> {
        if pattern.is_empty() {
            return Err(DbError::IndexError("index key pattern is empty".into()));
        }
        let mut keys = Vec::with_capacity(pattern.len());
        for (field, dir) in pattern {
            let order = match crate::query::bson_as_i64(dir) {
                Some(1) => Order::Asc,
                Some(-1) => Order::Desc,
                _ => {
                    return Err(DbError::IndexError(format!(
                        "index direction for '{field}' must be 1 or -1"
                    )));
                }
            };
            keys.push((field.clone(), order));
        }
        let name = keys
            .iter()
            .map(|(f, o)| format!("{f}_{}", o.as_i32()))
            .collect::<Vec<_>>()
            .join("_");
        Ok(Self { name, keys })
    }

    #[must_use]
    pub fn key_pattern(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        for (f, o) in &self.keys {
            out.insert(f.clone(), o.as_i32());
        }
        out
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(f, _)| f.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u128,
}

/// Bound on the key component that follows the equality prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBound {
    pub min: Option<(IndexKeyKind, bool)>,
    pub max: Option<(IndexKeyKind, bool)>,
}

impl RangeBound {
    fn admits(&self, k: &IndexKeyKind) -> bool {
        if let Some((m, incl)) = &self.min {
            if k.class() != m.class() || k < m || (!incl && k == m) {
                return false;
            }
        }
        if let Some((m, incl)) = &self.max {
            if k.class() != m.class() || k > m || (!incl && k == m) {
                return false;
            }
        }
        true
    }

    fn passed(&self, k: &IndexKeyKind) -> bool {
        self.max.as_ref().is_some_and(|(m, incl)| k > m || (!incl && k == m))
    }
}

/// Key bounds for one scan: equality on the leading components, optionally a range
/// on the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexBounds {
    pub eq_prefix: Vec<IndexKeyKind>,
    pub range: Option<RangeBound>,
}

/// Ids produced by an index scan together with the number of index entries visited.
#[derive(Debug, Clone, Default)]
pub struct IndexScan {
    pub ids: Vec<DocumentId>,
    pub keys_examined: usize,
}

/// Ordered (B-tree) index over one or more fields.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub spec: IndexSpec,
    map: BTreeMap<Vec<IndexKeyKind>, BTreeSet<DocumentId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    /// Every document gets a key; unkeyable components become `Other`.
    fn key_for(&self, doc: &BsonDocument) -> Vec<IndexKeyKind> {
        self.spec
            .fields()
            .map(|f| key_from_bson(crate::query::get_path(doc, f)).unwrap_or(IndexKeyKind::Other))
            .collect()
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        if self.map.entry(self.key_for(doc)).or_default().insert(id.clone()) {
            self.stats.entries += 1;
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let k = self.key_for(doc);
        if let Some(set) = self.map.get_mut(&k) {
            if set.remove(id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
            self.stats.keys = self.map.len();
        }
    }

    /// Walks the keys admitted by `bounds`, in key order.
    pub fn scan(&mut self, bounds: &IndexBounds) -> IndexScan {
        let prefix = &bounds.eq_prefix;
        let mut start = prefix.clone();
        if let Some((min, _)) = bounds.range.as_ref().and_then(|r| r.min.as_ref()) {
            start.push(min.clone());
        }
        let depth = prefix.len();
        let mut out = IndexScan::default();
        for (key, ids) in self.map.range(start..) {
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(range) = &bounds.range
                && let Some(component) = key.get(depth)
            {
                if range.passed(component) {
                    break;
                }
                out.keys_examined += ids.len();
                if !range.admits(component) {
                    continue;
                }
            } else {
                out.keys_examined += ids.len();
            }
            out.ids.extend(ids.iter().cloned());
        }
        if out.ids.is_empty() {
            self.stats.misses += 1;
        } else {
            self.stats.hits += 1;
        }
        out
    }
}

/// All indexes of one collection, keyed by index name.
#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: BTreeMap<String, BTreeIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: BTreeMap::new() }
    }

    /// Registers an empty index. Returns `false` when an index of that name exists already.
    ///
    /// # Errors
    /// Returns `DbError::IndexError` if an index with the same name but a different
    /// key pattern is registered.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<bool, DbError> {
        if let Some(existing) = self.indexes.get(&spec.name) {
            if existing.spec != spec {
                return Err(DbError::IndexError(format!(
                    "index '{}' exists with different keys",
                    spec.name
                )));
            }
            return Ok(false);
        }
        self.indexes.insert(spec.name.clone(), BTreeIndex::new(spec));
        Ok(true)
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexSpec> {
        self.indexes.values().map(|i| i.spec.clone()).collect()
    }
}

pub fn index_insert_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.insert(doc, id);
    }
}

pub fn index_remove_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.remove(doc, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn name_follows_key_pattern() {
        let s = IndexSpec::from_keys(&doc! {"author": 1, "published_year": -1}).unwrap();
        assert_eq!(s.name, "author_1_published_year_-1");
        assert_eq!(s.key_pattern(), doc! {"author": 1, "published_year": -1});
    }

    #[test]
    fn rejects_bad_direction() {
        assert!(IndexSpec::from_keys(&doc! {"title": 2}).is_err());
        assert!(IndexSpec::from_keys(&doc! {}).is_err());
    }

    #[test]
    fn int_and_double_share_a_key() {
        assert_eq!(key_from_bson(Some(&Bson::Int32(1960))), key_from_bson(Some(&Bson::Double(1960.0))));
        assert!(key_from_bson(Some(&Bson::Array(vec![]))).is_none());
    }

    #[test]
    fn unkeyable_values_stay_reachable_by_prefix() {
        let spec = IndexSpec::from_keys(&doc! {"author": 1, "published_year": 1}).unwrap();
        let mut idx = BTreeIndex::new(spec);
        let listed = doc! {"author": "A", "published_year": [1999, 2001]};
        let id = DocumentId::new();
        idx.insert(&listed, &id);
        assert_eq!(idx.stats.entries, 1);

        let bounds = IndexBounds { eq_prefix: vec![IndexKeyKind::Str("A".into())], range: None };
        assert_eq!(idx.scan(&bounds).ids, vec![id.clone()]);

        let ranged = IndexBounds {
            eq_prefix: vec![IndexKeyKind::Str("A".into())],
            range: Some(RangeBound { min: Some((IndexKeyKind::Num(OrderedFloat(1990.0)), true)), max: None }),
        };
        assert!(idx.scan(&ranged).ids.is_empty());

        idx.remove(&listed, &id);
        assert_eq!(idx.stats.entries, 0);
        assert_eq!(idx.stats.keys, 0);
    }
}
