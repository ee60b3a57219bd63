use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::expr::Expression;
use crate::errors::DbError;
use crate::query::{bson_as_f64, compare_for_sort};
use crate::types::ID_FIELD;

/// The `_id` of a `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    Null,
    Single(Expression),
    Compound(Vec<(String, Expression)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expression),
    Avg(Expression),
    Min(Expression),
    Max(Expression),
    Count,
    First(Expression),
    Last(Expression),
}

enum AccState {
    Sum { int_total: Option<i64>, total: f64 },
    Avg { sum: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    Count(i64),
    First(Option<Bson>),
    Last(Option<Bson>),
}

impl Accumulator {
    fn parse(name: &str, spec: &Bson) -> Result<Self, DbError> {
        let Bson::Document(d) = spec else {
            return Err(DbError::PipelineError(format!("accumulator '{name}' must be a document")));
        };
        let mut ops = d.iter();
        let (Some((op, arg)), None) = (ops.next(), ops.next()) else {
            return Err(DbError::PipelineError(format!(
                "accumulator '{name}' must have exactly one operator"
            )));
        };
        let e = || Expression::parse(arg);
        Ok(match op.as_str() {
            "$sum" => Self::Sum(e()?),
            "$avg" => Self::Avg(e()?),
            "$min" => Self::Min(e()?),
            "$max" => Self::Max(e()?),
            "$count" => Self::Count,
            "$first" => Self::First(e()?),
            "$last" => Self::Last(e()?),
            other => return Err(DbError::PipelineError(format!("unknown accumulator {other}"))),
        })
    }

    fn initial(&self) -> AccState {
        match self {
            Self::Sum(_) => AccState::Sum { int_total: Some(0), total: 0.0 },
            Self::Avg(_) => AccState::Avg { sum: 0.0, count: 0 },
            Self::Min(_) => AccState::Min(None),
            Self::Max(_) => AccState::Max(None),
            Self::Count => AccState::Count(0),
            Self::First(_) => AccState::First(None),
            Self::Last(_) => AccState::Last(None),
        }
    }
}

fn keep_extreme(current: &mut Option<Bson>, val: Bson, want: Ordering) {
    if matches!(val, Bson::Null) {
        return;
    }
    let replace = current.as_ref().is_none_or(|cur| compare_for_sort(Some(&val), Some(cur)) == want);
    if replace {
        *current = Some(val);
    }
}

impl AccState {
    fn feed(&mut self, acc: &Accumulator, doc: &BsonDocument) {
        match (acc, self) {
            (Accumulator::Sum(e), Self::Sum { int_total, total }) => {
                let v = e.eval(doc);
                if let Some(n) = bson_as_f64(&v) {
                    *total += n;
                    *int_total = match v {
                        Bson::Int32(i) => int_total.and_then(|t| t.checked_add(i64::from(i))),
                        Bson::Int64(i) => int_total.and_then(|t| t.checked_add(i)),
                        _ => None,
                    };
                }
            }
            (Accumulator::Avg(e), Self::Avg { sum, count }) => {
                if let Some(n) = bson_as_f64(&e.eval(doc)) {
                    *sum += n;
                    *count += 1;
                }
            }
            (Accumulator::Min(e), Self::Min(cur)) => keep_extreme(cur, e.eval(doc), Ordering::Less),
            (Accumulator::Max(e), Self::Max(cur)) => keep_extreme(cur, e.eval(doc), Ordering::Greater),
            (Accumulator::Count, Self::Count(c)) => *c += 1,
            (Accumulator::First(e), Self::First(cur)) => {
                if cur.is_none() {
                    *cur = Some(e.eval(doc));
                }
            }
            (Accumulator::Last(e), Self::Last(cur)) => *cur = Some(e.eval(doc)),
            _ => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { int_total: Some(i), .. } => Bson::Int64(i),
            Self::Sum { int_total: None, total } => Bson::Double(total),
            Self::Avg { count: 0, .. } => Bson::Null,
            Self::Avg { sum, count } => Bson::Double(sum / count as f64),
            Self::Count(c) => Bson::Int64(c),
            Self::Min(v) | Self::Max(v) | Self::First(v) | Self::Last(v) => v.unwrap_or(Bson::Null),
        }
    }
}

/// Parsed `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupStage {
    /// # Errors
    /// Returns `DbError::PipelineError` when `_id` is missing or an accumulator is malformed.
    pub fn parse(spec: &BsonDocument) -> Result<Self, DbError> {
        let id = spec
            .get(ID_FIELD)
            .ok_or_else(|| DbError::PipelineError("$group requires an '_id' field".into()))?;
        let key = match id {
            Bson::Null => GroupKey::Null,
            Bson::Document(d) if !d.keys().any(|k| k.starts_with('$')) => GroupKey::Compound(
                d.iter()
                    .map(|(k, v)| Ok((k.clone(), Expression::parse(v)?)))
                    .collect::<Result<_, DbError>>()?,
            ),
            other => GroupKey::Single(Expression::parse(other)?),
        };
        let accumulators = spec
            .iter()
            .filter(|(name, _)| name.as_str() != ID_FIELD)
            .map(|(name, acc)| Ok((name.clone(), Accumulator::parse(name, acc)?)))
            .collect::<Result<_, DbError>>()?;
        Ok(Self { key, accumulators })
    }

    fn key_of(&self, doc: &BsonDocument) -> Bson {
        match &self.key {
            GroupKey::Null => Bson::Null,
            GroupKey::Single(e) => e.eval(doc),
            GroupKey::Compound(fields) => {
                let mut out = BsonDocument::new();
                for (name, e) in fields {
                    out.insert(name.clone(), e.eval(doc));
                }
                Bson::Document(out)
            }
        }
    }

    /// Groups come out in the order their key was first seen.
    #[must_use]
    pub fn run(&self, docs: &[BsonDocument]) -> Vec<BsonDocument> {
        let mut slot_of: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
        for doc in docs {
            let key = self.key_of(doc);
            let slot = *slot_of.entry(canonical(&key)).or_insert_with(|| {
                groups.push((key, self.accumulators.iter().map(|(_, a)| a.initial()).collect()));
                groups.len() - 1
            });
            for ((_, acc), state) in self.accumulators.iter().zip(groups[slot].1.iter_mut()) {
                state.feed(acc, doc);
            }
        }
        groups
            .into_iter()
            .map(|(key, states)| {
                let mut out = BsonDocument::new();
                out.insert(ID_FIELD, key);
                for ((name, _), state) in self.accumulators.iter().zip(states) {
                    out.insert(name.clone(), state.finish());
                }
                out
            })
            .collect()
    }
}

/// Grouping identity: numbers compare by value whatever their BSON width.
fn canonical(v: &Bson) -> String {
    if let Some(n) = bson_as_f64(v) {
        return format!("n:{n:?}");
    }
    match v {
        Bson::Document(d) => {
            let parts: Vec<String> = d.iter().map(|(k, v)| format!("{k:?}={}", canonical(v))).collect();
            format!("d:{{{}}}", parts.join(","))
        }
        Bson::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical).collect();
            format!("a:[{}]", parts.join(","))
        }
        Bson::String(s) => format!("s:{s:?}"),
        other => format!("o:{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sum_stays_integral_and_avg_is_double() {
        let g = GroupStage::parse(&doc! {
            "_id": "$g",
            "n": {"$sum": 1},
            "p": {"$sum": "$p"},
            "avg": {"$avg": "$p"},
        })
        .unwrap();
        let out = g.run(&[doc! {"g": "a", "p": 2}, doc! {"g": "a", "p": 4}, doc! {"g": "b", "p": 1.5}]);
        assert_eq!(out[0], doc! {"_id": "a", "n": 2_i64, "p": 6_i64, "avg": 3.0});
        assert_eq!(out[1], doc! {"_id": "b", "n": 1_i64, "p": 1.5, "avg": 1.5});
    }

    #[test]
    fn int_and_double_keys_share_a_group() {
        let g = GroupStage::parse(&doc! {"_id": "$y", "c": {"$count": {}}}).unwrap();
        let out = g.run(&[doc! {"y": 1960}, doc! {"y": 1960.0}]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_i64("c").unwrap(), 2);
    }

    #[test]
    fn min_max_first_last() {
        let g = GroupStage::parse(&doc! {
            "_id": null,
            "lo": {"$min": "$v"}, "hi": {"$max": "$v"},
            "first": {"$first": "$v"}, "last": {"$last": "$v"},
        })
        .unwrap();
        let out = g.run(&[doc! {"v": 3}, doc! {"v": 1}, doc! {"x": 0}, doc! {"v": 2}]);
        assert_eq!(out[0], doc! {"_id": null, "lo": 1, "hi": 3, "first": 3, "last": 2});
    }

    #[test]
    fn group_requires_id() {
        assert!(GroupStage::parse(&doc! {"n": {"$sum": 1}}).is_err());
        assert!(GroupStage::parse(&doc! {"_id": "$a", "n": {"$median": "$b"}}).is_err());
    }
}
