use bson::{Bson, Document as BsonDocument};

use super::types::{CmpOp, Filter};
use crate::index::{IndexBounds, IndexManager, RangeBound, key_from_bson};

/// Access path chosen for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    CollScan,
    IndexScan { index: String, key_pattern: BsonDocument, bounds: IndexBounds },
}

impl Plan {
    #[must_use]
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Self::CollScan => None,
            Self::IndexScan { index, .. } => Some(index),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CollScan => "COLLSCAN",
            Self::IndexScan { .. } => "IXSCAN",
        }
    }
}

/// Flattens the top-level conjunction into simple comparisons. Predicates under
/// `$or`/`$not` never narrow an index scan and are left to the fetch filter.
fn conjuncts<'a>(filter: &'a Filter, out: &mut Vec<(&'a str, CmpOp, &'a Bson)>) {
    match filter {
        Filter::Cmp { path, op, value } => out.push((path, *op, value)),
        Filter::And(fs) => fs.iter().for_each(|f| conjuncts(f, out)),
        _ => {}
    }
}

fn bounds_for(fields: &[&str], preds: &[(&str, CmpOp, &Bson)]) -> IndexBounds {
    let mut bounds = IndexBounds::default();
    for field in fields {
        let eq = preds
            .iter()
            .find(|(p, op, _)| p == field && *op == CmpOp::Eq)
            .and_then(|(_, _, v)| key_from_bson(Some(v)));
        if let Some(k) = eq {
            bounds.eq_prefix.push(k);
            continue;
        }
        let mut range = RangeBound::default();
        for (p, op, v) in preds.iter().filter(|(p, _, _)| p == field) {
            let Some(k) = key_from_bson(Some(v)) else { continue };
            match op {
                CmpOp::Gt if range.min.is_none() => range.min = Some((k, false)),
                CmpOp::Gte if range.min.is_none() => range.min = Some((k, true)),
                CmpOp::Lt if range.max.is_none() => range.max = Some((k, false)),
                CmpOp::Lte if range.max.is_none() => range.max = Some((k, true)),
                _ => {
                    log::trace!("predicate on {p} not used for index bounds");
                }
            }
        }
        if range.min.is_some() || range.max.is_some() {
            bounds.range = Some(range);
        }
        break;
    }
    bounds
}

/// Picks the index whose leading keys are covered by the most equality predicates,
/// then by a range predicate; ties go to the narrower key pattern, then to the
/// name that sorts first. Falls back to a collection scan.
#[must_use]
pub fn plan_query(mgr: &IndexManager, filter: &Filter) -> Plan {
    let mut preds = Vec::new();
    conjuncts(filter, &mut preds);
    if preds.is_empty() {
        return Plan::CollScan;
    }
    let mut best: Option<((usize, bool, std::cmp::Reverse<usize>), &str, IndexBounds)> = None;
    for (name, idx) in &mgr.indexes {
        let fields: Vec<&str> = idx.spec.fields().collect();
        let bounds = bounds_for(&fields, &preds);
        let score = (bounds.eq_prefix.len(), bounds.range.is_some(), std::cmp::Reverse(fields.len()));
        if score.0 == 0 && !score.1 {
            continue;
        }
        if best.as_ref().is_none_or(|(s, _, _)| score > *s) {
            best = Some((score, name, bounds));
        }
    }
    match best {
        Some((_, name, bounds)) => {
            let key_pattern =
                mgr.indexes.get(name).map(|i| i.spec.key_pattern()).unwrap_or_default();
            Plan::IndexScan { index: name.to_string(), key_pattern, bounds }
        }
        None => Plan::CollScan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSpec;
    use bson::doc;

    fn manager() -> IndexManager {
        let mut mgr = IndexManager::new();
        mgr.create_index(IndexSpec::from_keys(&doc! {"title": 1}).unwrap()).unwrap();
        mgr.create_index(IndexSpec::from_keys(&doc! {"author": 1, "published_year": 1}).unwrap())
            .unwrap();
        mgr
    }

    #[test]
    fn equality_on_title_uses_title_index() {
        let plan = plan_query(&manager(), &Filter::eq("title", "The Hobbit"));
        assert_eq!(plan.index_name(), Some("title_1"));
    }

    #[test]
    fn compound_prefers_most_equalities() {
        let f = Filter::And(vec![Filter::eq("author", "Harper Lee"), Filter::eq("published_year", 1960)]);
        let Plan::IndexScan { index, bounds, .. } = plan_query(&manager(), &f) else {
            panic!("expected index scan");
        };
        assert_eq!(index, "author_1_published_year_1");
        assert_eq!(bounds.eq_prefix.len(), 2);
    }

    #[test]
    fn range_on_non_leading_field_scans_collection() {
        assert_eq!(plan_query(&manager(), &Filter::gt("published_year", 2010)), Plan::CollScan);
        assert_eq!(plan_query(&manager(), &Filter::True), Plan::CollScan);
    }
}
