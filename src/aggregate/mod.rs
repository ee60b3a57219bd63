//! Aggregation pipelines over BSON documents.
//!
//! A pipeline is parsed once from its stage documents and then run over the
//! documents of a collection in natural order.

mod expr;
mod group;

use bson::{Bson, Document as BsonDocument};

use crate::errors::DbError;
use crate::query::{
    Filter, SortSpec, bson_as_i64, compare_docs, eval_filter, get_path, parse_sort,
};
use crate::types::ID_FIELD;

pub use expr::Expression;
pub use group::{Accumulator, GroupKey, GroupStage};

/// Output field of a `$project` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Compute(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group(GroupStage),
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
    Project { fields: Vec<(String, ProjectField)>, include_id: bool },
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Group(_) => "$group",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Project { .. } => "$project",
        }
    }

    /// Parses one `{ $stage: spec }` document.
    ///
    /// # Errors
    /// Returns `DbError::PipelineError` for unknown stages or malformed specs.
    pub fn parse(stage: &BsonDocument) -> Result<Self, DbError> {
        let mut entries = stage.iter();
        let (Some((op, spec)), None) = (entries.next(), entries.next()) else {
            return Err(DbError::PipelineError("a stage must have exactly one operator".into()));
        };
        let as_doc = || match spec {
            Bson::Document(d) => Ok(d),
            _ => Err(DbError::PipelineError(format!("{op} requires a document"))),
        };
        let as_count = || {
            bson_as_i64(spec)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| DbError::PipelineError(format!("{op} requires a non-negative integer")))
        };
        Ok(match op.as_str() {
            "$match" => Self::Match(
                Filter::try_from(as_doc()?).map_err(|e| DbError::PipelineError(e.to_string()))?,
            ),
            "$group" => Self::Group(GroupStage::parse(as_doc()?)?),
            "$sort" => {
                let sort = parse_sort(as_doc()?).map_err(|e| DbError::PipelineError(e.to_string()))?;
                if sort.is_empty() {
                    return Err(DbError::PipelineError("$sort requires at least one key".into()));
                }
                Self::Sort(sort)
            }
            "$skip" => Self::Skip(as_count()?),
            "$limit" => match as_count()? {
                0 => return Err(DbError::PipelineError("$limit must be positive".into())),
                n => Self::Limit(n),
            },
            "$project" => parse_project(as_doc()?)?,
            other => return Err(DbError::PipelineError(format!("unsupported stage {other}"))),
        })
    }

    fn apply(&self, docs: Vec<BsonDocument>) -> Vec<BsonDocument> {
        match self {
            Self::Match(f) => docs.into_iter().filter(|d| eval_filter(d, f)).collect(),
            Self::Group(g) => g.run(&docs),
            Self::Sort(sort) => {
                let mut docs = docs;
                docs.sort_by(|a, b| compare_docs(a, b, sort));
                docs
            }
            Self::Skip(n) => docs.into_iter().skip(*n).collect(),
            Self::Limit(n) => docs.into_iter().take(*n).collect(),
            Self::Project { fields, include_id } if fields.is_empty() => docs
                .into_iter()
                .map(|mut d| {
                    if !*include_id {
                        d.remove(ID_FIELD);
                    }
                    d
                })
                .collect(),
            Self::Project { fields, include_id } => docs
                .iter()
                .map(|d| {
                    let mut out = BsonDocument::new();
                    if *include_id && let Some(id) = d.get(ID_FIELD) {
                        out.insert(ID_FIELD, id.clone());
                    }
                    for (name, f) in fields {
                        match f {
                            ProjectField::Include => {
                                if let Some(v) = get_path(d, name) {
                                    out.insert(name.clone(), v.clone());
                                }
                            }
                            ProjectField::Compute(e) => {
                                out.insert(name.clone(), e.eval(d));
                            }
                        }
                    }
                    out
                })
                .collect(),
        }
    }
}

fn parse_project(spec: &BsonDocument) -> Result<Stage, DbError> {
    let mut fields = Vec::new();
    let mut include_id = true;
    for (name, v) in spec {
        let flag = match v {
            Bson::Boolean(b) => Some(*b),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => bson_as_i64(v).map(|n| n != 0),
            _ => None,
        };
        match (name.as_str(), flag) {
            (ID_FIELD, Some(on)) => include_id = on,
            (_, Some(true)) => fields.push((name.clone(), ProjectField::Include)),
            (_, Some(false)) => {
                return Err(DbError::PipelineError(format!(
                    "cannot exclude '{name}' in an inclusion projection"
                )));
            }
            (_, None) => fields.push((name.clone(), ProjectField::Compute(Expression::parse(v)?))),
        }
    }
    if fields.is_empty() && include_id && spec.contains_key(ID_FIELD) {
        fields.push((ID_FIELD.to_string(), ProjectField::Include));
    }
    Ok(Stage::Project { fields, include_id })
}

/// An ordered list of stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// # Errors
    /// Returns `DbError::PipelineError` naming the first stage that fails to parse.
    pub fn parse(stages: &[BsonDocument]) -> Result<Self, DbError> {
        let stages = stages
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Stage::parse(s).map_err(|e| match e {
                    DbError::PipelineError(msg) => DbError::PipelineError(format!("stage {i}: {msg}")),
                    other => other,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { stages })
    }

    #[must_use]
    pub fn run(&self, docs: Vec<BsonDocument>) -> Vec<BsonDocument> {
        self.stages.iter().fold(docs, |acc, stage| {
            let n = acc.len();
            let out = stage.apply(acc);
            log::trace!("{}: {n} -> {} documents", stage.name(), out.len());
            out
        })
    }
}
