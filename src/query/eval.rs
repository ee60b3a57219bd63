use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, Order, Projection, SortSpec};
use crate::types::ID_FIELD;

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => {
            let found = get_path(doc, path);
            match op {
                CmpOp::Eq => found.is_some_and(|v| bson_equal(v, value)),
                CmpOp::Ne => !found.is_some_and(|v| bson_equal(v, value)),
                CmpOp::Gt => cmp_matches(found, value, |o| o == Ordering::Greater),
                CmpOp::Gte => cmp_matches(found, value, |o| o != Ordering::Less),
                CmpOp::Lt => cmp_matches(found, value, |o| o == Ordering::Less),
                CmpOp::Lte => cmp_matches(found, value, |o| o != Ordering::Greater),
            }
        }
    }
}

fn cmp_matches(found: Option<&Bson>, value: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    found.and_then(|v| compare_bson(v, value)).is_some_and(pred)
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|x| bson_equal(v, x))
}

/// Resolves a dotted path such as `_id.decade`.
#[must_use]
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bson_as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bson_as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

/// Equality with numeric widening: int32 `1960` equals double `1960.0`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (bson_as_f64(a), bson_as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Comparison for range predicates. Values of different type classes do not
/// compare (`None`), so `{year: {$gt: 2010}}` never matches a string year.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (bson_as_f64(a), bson_as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: missing/null first, then numbers, strings,
/// sub-documents, arrays, booleans, dates.
#[must_use]
pub fn compare_for_sort(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (ra, rb) = (sort_rank(a), sort_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) => match (bson_as_f64(x), bson_as_f64(y)) {
            (Some(fx), Some(fy)) => fx.total_cmp(&fy),
            _ => compare_bson(x, y).unwrap_or(Ordering::Equal),
        },
        _ => Ordering::Equal,
    }
}

const fn sort_rank(v: Option<&Bson>) -> u8 {
    match v {
        None | Some(Bson::Null | Bson::Undefined) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 1,
        Some(Bson::String(_) | Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Binary(_)) => 5,
        Some(Bson::ObjectId(_)) => 6,
        Some(Bson::Boolean(_)) => 7,
        Some(Bson::DateTime(_)) => 8,
        Some(Bson::Timestamp(_)) => 9,
        Some(_) => 10,
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = compare_for_sort(get_path(a, &s.field), get_path(b, &s.field));
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Applies `projection` to `doc`. With no listed fields the document is kept
/// whole and only `_id` may be dropped.
#[must_use]
pub fn project_fields(doc: &BsonDocument, projection: &Projection, max_fields: usize) -> BsonDocument {
    if projection.fields.is_empty() {
        let mut out = doc.clone();
        if !projection.include_id {
            out.remove(ID_FIELD);
        }
        return out;
    }
    let mut out = BsonDocument::new();
    if projection.include_id
        && let Some(id) = doc.get(ID_FIELD)
    {
        out.insert(ID_FIELD, id.clone());
    }
    for f in projection.fields.iter().take(max_fields) {
        if f == ID_FIELD {
            continue;
        }
        if let Some(v) = get_path(doc, f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn range_is_type_bracketed() {
        let d = doc! {"published_year": "2015"};
        assert!(!eval_filter(&d, &Filter::gt("published_year", 2010)));
        let d = doc! {"published_year": 2015};
        assert!(eval_filter(&d, &Filter::gt("published_year", 2010)));
    }

    #[test]
    fn ne_matches_missing_field() {
        let f = Filter::Cmp { path: "genre".into(), op: CmpOp::Ne, value: "Fiction".into() };
        assert!(eval_filter(&doc! {"title": "x"}, &f));
        assert!(!eval_filter(&doc! {"genre": "Fiction"}, &f));
    }

    #[test]
    fn nested_path_lookup() {
        let d = doc! {"_id": {"decade": 1920}};
        assert_eq!(get_path(&d, "_id.decade"), Some(&Bson::Int32(1920)));
        assert_eq!(get_path(&d, "_id.decade.x"), None);
    }

    #[test]
    fn sort_puts_missing_first() {
        assert_eq!(compare_for_sort(None, Some(&Bson::Int32(1))), Ordering::Less);
        assert_eq!(compare_for_sort(Some(&Bson::Int32(2)), Some(&Bson::Double(1.5))), Ordering::Greater);
    }

    #[test]
    fn id_only_exclusion_keeps_other_fields() {
        let d = doc! {"_id": "b1", "title": "Dune", "price": 9.5};
        let p = Projection { fields: vec![], include_id: false };
        assert_eq!(project_fields(&d, &p, 64), doc! {"title": "Dune", "price": 9.5});
        let p = Projection { fields: vec![], include_id: true };
        assert_eq!(project_fields(&d, &p, 64), d);
    }

    #[test]
    fn in_set_checks_every_value() {
        let mut values: Vec<Bson> = (0..1500).map(Bson::Int32).collect();
        values.push(Bson::String("late".into()));
        let f = Filter::In { path: "tag".into(), values };
        assert!(eval_filter(&doc! {"tag": "late"}, &f));
    }
}
