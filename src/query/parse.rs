use crate::errors::DbError;
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};

use super::eval::{bson_as_f64, bson_as_i64};
use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, MAX_UPDATE_FIELDS, Order,
    Projection, SortSpec, UpdateDoc,
};

fn within_limit(what: &str, n: usize, max: usize) -> Result<(), DbError> {
    if n > max {
        return Err(DbError::QueryError(format!("{what} has {n} entries, exceeds limit of {max}")));
    }
    Ok(())
}

impl TryFrom<&BsonDocument> for Filter {
    type Error = DbError;

    /// Parses a filter document such as `{in_stock: true, published_year: {$gt: 2010}}`.
    /// Top-level keys are ANDed.
    fn try_from(doc: &BsonDocument) -> Result<Self, Self::Error> {
        let mut parts = Vec::new();
        for (key, value) in doc {
            match key.as_str() {
                "$and" => parts.push(Self::And(parse_filter_list(key, value)?)),
                "$or" => parts.push(Self::Or(parse_filter_list(key, value)?)),
                op if op.starts_with('$') => {
                    return Err(DbError::QueryError(format!("unknown top-level operator {op}")));
                }
                path => parts.extend(parse_field(path, value)?),
            }
        }
        Ok(match parts.len() {
            0 => Self::True,
            1 => parts.remove(0),
            _ => Self::And(parts),
        })
    }
}

fn parse_filter_list(op: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(DbError::QueryError(format!("{op} requires an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => Filter::try_from(d),
            _ => Err(DbError::QueryError(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(value: &Bson) -> bool {
    matches!(value, Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')))
}

fn parse_field(path: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Document(ops) = value else {
        return Ok(vec![Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.clone() }]);
    };
    if !is_operator_doc(value) {
        return Ok(vec![Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.clone() }]);
    }
    let mut out = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        let cmp = |op| Filter::Cmp { path: path.to_string(), op, value: arg.clone() };
        out.push(match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => cmp(CmpOp::Ne),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" | "$nin" => {
                let Bson::Array(values) = arg else {
                    return Err(DbError::QueryError(format!("{op} requires an array")));
                };
                within_limit(op, values.len(), MAX_IN_SET)?;
                let values = values.clone();
                if op == "$in" {
                    Filter::In { path: path.to_string(), values }
                } else {
                    Filter::Nin { path: path.to_string(), values }
                }
            }
            "$exists" => Filter::Exists { path: path.to_string(), exists: truthy(arg) },
            "$not" => {
                if !is_operator_doc(arg) {
                    return Err(DbError::QueryError("$not requires an operator document".into()));
                }
                let mut inner = parse_field(path, arg)?;
                let inner = if inner.len() == 1 { inner.remove(0) } else { Filter::And(inner) };
                Filter::Not(Box::new(inner))
            }
            other => {
                return Err(DbError::QueryError(format!("unknown operator {other} on '{path}'")));
            }
        });
    }
    Ok(out)
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => bson_as_f64(other).is_none_or(|f| f != 0.0),
    }
}

impl TryFrom<&BsonDocument> for UpdateDoc {
    type Error = DbError;

    /// Parses `{$set: {...}, $inc: {...}, $unset: {...}}`.
    fn try_from(doc: &BsonDocument) -> Result<Self, Self::Error> {
        let mut out = Self::default();
        for (op, arg) in doc {
            let Bson::Document(fields) = arg else {
                return Err(DbError::QueryError(format!("{op} requires a document")));
            };
            within_limit(op, fields.len(), MAX_UPDATE_FIELDS)?;
            match op.as_str() {
                "$set" => {
                    for (k, v) in fields {
                        out.set.push((k.clone(), v.clone()));
                    }
                }
                "$inc" => {
                    for (k, v) in fields {
                        let by = bson_as_f64(v)
                            .ok_or_else(|| DbError::QueryError("$inc requires numeric".into()))?;
                        out.inc.push((k.clone(), by));
                    }
                }
                "$unset" => out.unset.extend(fields.keys().cloned()),
                other => {
                    return Err(DbError::QueryError(format!("unsupported update operator {other}")));
                }
            }
        }
        if out.set.iter().any(|(k, _)| k == ID_FIELD)
            || out.inc.iter().any(|(k, _)| k == ID_FIELD)
            || out.unset.iter().any(|k| k == ID_FIELD)
        {
            return Err(DbError::QueryError("the _id field is immutable".into()));
        }
        if out.set.is_empty() && out.inc.is_empty() && out.unset.is_empty() {
            return Err(DbError::QueryError("update document has no operators".into()));
        }
        Ok(out)
    }
}

impl TryFrom<&BsonDocument> for Projection {
    type Error = DbError;

    /// Parses `{_id: 0, title: 1, author: 1}`. Only `_id` may be excluded; `{}` and
    /// `{_id: 0}` keep every other field.
    fn try_from(doc: &BsonDocument) -> Result<Self, Self::Error> {
        within_limit("projection", doc.len(), MAX_PROJECTION_FIELDS)?;
        let mut fields = Vec::new();
        let mut include_id = true;
        for (field, flag) in doc {
            let on = truthy(flag);
            if field == ID_FIELD {
                include_id = on;
            } else if on {
                fields.push(field.clone());
            } else {
                return Err(DbError::QueryError(format!(
                    "cannot exclude '{field}' in an inclusion projection"
                )));
            }
        }
        // `{_id: 1}` alone selects only `_id`
        if fields.is_empty() && include_id && doc.contains_key(ID_FIELD) {
            fields.push(ID_FIELD.to_string());
        }
        Ok(Self { fields, include_id })
    }
}

/// Parses a sort document such as `{price: -1}`.
///
/// # Errors
/// Returns `DbError::QueryError` for a direction other than `1`/`-1` or too many keys.
pub fn parse_sort(doc: &BsonDocument) -> Result<Vec<SortSpec>, DbError> {
    within_limit("sort", doc.len(), MAX_SORT_FIELDS)?;
    doc.iter()
        .map(|(field, dir)| {
            let order = match bson_as_i64(dir) {
                Some(1) => Order::Asc,
                Some(-1) => Order::Desc,
                _ => return Err(DbError::QueryError(format!("sort direction for '{field}' must be 1 or -1"))),
            };
            Ok(SortSpec { field: field.clone(), order })
        })
        .collect()
}

/// Parses the compact command-line form `-price,+title` (a bare name sorts ascending).
///
/// # Errors
/// Returns `DbError::QueryError` when more than the allowed number of keys is given.
pub fn parse_sort_list(spec: &str) -> Result<Vec<SortSpec>, DbError> {
    let keys: Vec<SortSpec> = spec
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('-') {
            Some(f) => SortSpec::desc(f),
            None => SortSpec::asc(s.trim_start_matches('+')),
        })
        .collect();
    within_limit("sort", keys.len(), MAX_SORT_FIELDS)?;
    Ok(keys)
}

fn json_to_document(json: &str) -> Result<BsonDocument, DbError> {
    Ok(serde_json::from_str::<BsonDocument>(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not a valid filter object.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    Filter::try_from(&json_to_document(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not a valid update object.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, DbError> {
    UpdateDoc::try_from(&json_to_document(json)?)
}

/// Parses a JSON array of pipeline stage objects.
///
/// # Errors
/// Returns an error if the JSON is not an array of objects.
pub fn parse_pipeline_json(json: &str) -> Result<Vec<BsonDocument>, DbError> {
    Ok(serde_json::from_str::<Vec<BsonDocument>>(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn top_level_keys_are_anded() {
        let f = Filter::try_from(&doc! {"in_stock": true, "published_year": {"$gt": 2010}}).unwrap();
        assert_eq!(
            f,
            Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", 2010)])
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(Filter::try_from(&doc! {"price": {"$near": 1}}).is_err());
        assert!(Filter::try_from(&doc! {"$where": "1"}).is_err());
    }

    #[test]
    fn set_update_parses() {
        let u = UpdateDoc::try_from(&doc! {"$set": {"price": 13.49}}).unwrap();
        assert_eq!(u, UpdateDoc::set("price", 13.49));
        assert!(UpdateDoc::try_from(&doc! {"$set": {"_id": 1}}).is_err());
        assert!(UpdateDoc::try_from(&doc! {"price": 1}).is_err());
    }

    #[test]
    fn projection_suppresses_id() {
        let p = Projection::try_from(&doc! {"_id": 0, "title": 1, "author": 1, "price": 1}).unwrap();
        assert!(!p.include_id);
        assert_eq!(p.fields, vec!["title", "author", "price"]);
        assert!(Projection::try_from(&doc! {"title": 1, "pages": 0}).is_err());
    }

    #[test]
    fn sort_list_parses_signs() {
        assert_eq!(parse_sort_list("-price, +title,pages").unwrap(), vec![
            SortSpec::desc("price"),
            SortSpec::asc("title"),
            SortSpec::asc("pages"),
        ]);
    }

    #[test]
    fn json_filter_uses_mongo_shape() {
        let f = parse_filter_json(r#"{"genre":"Fiction"}"#).unwrap();
        assert_eq!(f, Filter::eq("genre", "Fiction"));
    }

    #[test]
    fn id_only_projections_keep_the_rest() {
        let none = Projection::try_from(&doc! {}).unwrap();
        assert_eq!(none, Projection { fields: vec![], include_id: true });
        let no_id = Projection::try_from(&doc! {"_id": 0}).unwrap();
        assert_eq!(no_id, Projection { fields: vec![], include_id: false });
        let only_id = Projection::try_from(&doc! {"_id": 1}).unwrap();
        assert_eq!(only_id.fields, vec![ID_FIELD]);
    }

    #[test]
    fn oversized_inputs_are_rejected() {
        let many: Vec<i32> = (0..=1000).collect();
        assert!(Filter::try_from(&doc! {"tag": {"$in": many.clone()}}).is_err());
        assert!(Filter::try_from(&doc! {"tag": {"$nin": many}}).is_err());
        let fits: Vec<i32> = (0..1000).collect();
        assert!(Filter::try_from(&doc! {"tag": {"$in": fits}}).is_ok());

        let mut wide = BsonDocument::new();
        for i in 0..=MAX_UPDATE_FIELDS {
            wide.insert(format!("f{i}"), 1);
        }
        assert!(UpdateDoc::try_from(&doc! {"$set": wide.clone()}).is_err());
        assert!(UpdateDoc::try_from(&doc! {"$inc": wide.clone()}).is_err());
        assert!(UpdateDoc::try_from(&doc! {"$unset": wide}).is_err());

        let keys = (0..=MAX_SORT_FIELDS).map(|i| format!("k{i}")).collect::<Vec<_>>().join(",");
        assert!(parse_sort_list(&keys).is_err());
    }
}
