use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_UPDATE_FIELDS: usize = 128;
pub const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// The `1` / `-1` direction used in sort and index key documents.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

/// Inclusion projection. `_id` is kept unless `include_id` is false. An empty
/// `fields` list keeps the whole document, so `{_id: 0}` only drops `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<String>,
    pub include_id: bool,
}

/// Options for `find_docs`.
///
/// Sorting happens before skip/limit, projection last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    #[must_use]
    pub fn gt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Gt, value: value.into() }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, f64)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    #[must_use]
    pub fn set(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { set: vec![(path.into(), value.into())], ..Self::default() }
    }

    #[must_use]
    pub fn inc(path: impl Into<String>, by: f64) -> Self {
        Self { inc: vec![(path.into(), by)], ..Self::default() }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: u64,
}
