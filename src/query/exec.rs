use crate::collection::Collection;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::time::{Duration, Instant};

use super::cursor::Cursor;
use super::eval::{bson_as_f64, compare_docs, eval_filter, get_path, project_fields};
use super::plan::{Plan, plan_query};
use super::telemetry;
use super::types::{
    DeleteReport, Filter, FindOptions, MAX_LIMIT, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS,
    UpdateDoc, UpdateReport,
};

/// Outcome of running a find: the result rows plus the scan statistics that
/// `explain` reports.
#[derive(Debug, Clone)]
pub struct Execution {
    pub docs: Vec<BsonDocument>,
    pub plan: Plan,
    pub keys_examined: usize,
    pub docs_examined: usize,
    pub elapsed: Duration,
}

struct Matches {
    plan: Plan,
    rows: Vec<(DocumentId, BsonDocument)>,
    keys_examined: usize,
    docs_examined: usize,
}

/// Plans the filter, walks the chosen access path and keeps matching documents
/// in natural order.
fn matching(col: &Collection, filter: &Filter, stop_after_first: bool) -> Matches {
    let plan = plan_query(&col.indexes.read(), filter);
    let scan = match &plan {
        Plan::IndexScan { index, bounds, .. } => {
            col.indexes.write().indexes.get_mut(index).map(|idx| idx.scan(bounds))
        }
        Plan::CollScan => None,
    };
    let (plan, candidates, keys_examined) = match scan {
        Some(scan) => {
            let mut ids = scan.ids;
            col.sort_natural(&mut ids);
            (plan, Some(ids), scan.keys_examined)
        }
        // index vanished between planning and scanning
        None => (Plan::CollScan, None, 0),
    };

    let store = col.store.read();
    let mut rows = Vec::new();
    let mut docs_examined = 0usize;
    let mut visit = |id: &DocumentId, data: &BsonDocument| {
        docs_examined += 1;
        if eval_filter(data, filter) {
            rows.push((id.clone(), data.clone()));
        }
        stop_after_first && !rows.is_empty()
    };
    match candidates {
        Some(ids) => {
            for id in &ids {
                if let Some(doc) = store.get(id)
                    && visit(&doc.id, &doc.data)
                {
                    break;
                }
            }
        }
        None => {
            for doc in store.docs.values() {
                if visit(&doc.id, &doc.data) {
                    break;
                }
            }
        }
    }
    Matches { plan, rows, keys_examined, docs_examined }
}

/// Runs a find: filter, stable sort, skip/limit (capped at `MAX_LIMIT`), projection.
#[must_use]
pub fn execute(col: &Collection, filter: &Filter, opts: &FindOptions) -> Execution {
    let start = Instant::now();
    let Matches { plan, rows, keys_examined, docs_examined } = matching(col, filter, false);
    let mut docs: Vec<BsonDocument> = rows.into_iter().map(|(_, d)| d).collect();

    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        docs.sort_by(|a, b| compare_docs(a, b, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);
    let mut docs: Vec<BsonDocument> = docs.into_iter().skip(skip).take(limit).collect();

    if let Some(projection) = &opts.projection {
        for d in &mut docs {
            *d = project_fields(d, projection, MAX_PROJECTION_FIELDS);
        }
    }

    let elapsed = start.elapsed();
    telemetry::log_query(&telemetry::QueryEvent {
        op: "find",
        collection: col.name_str(),
        plan: plan.label(),
        index: plan.index_name(),
        duration_ms: elapsed_ms(elapsed),
        returned: docs.len(),
        keys_examined,
        docs_examined,
    });
    Execution { docs, plan, keys_examined, docs_examined, elapsed }
}

#[must_use]
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Cursor {
    Cursor::new(execute(col, filter, opts).docs)
}

#[must_use]
pub fn count_docs(col: &Collection, filter: &Filter) -> usize {
    matching(col, filter, false).rows.len()
}

/// Updates the first match in natural order. The filter is checked again on the
/// live document under the write lock; if another writer changed or removed the
/// match in between, the search starts over.
pub fn update_one(col: &Collection, filter: &Filter, update: &UpdateDoc) -> UpdateReport {
    let start = Instant::now();
    let mut report = UpdateReport::default();
    while let Some((id, _)) = matching(col, filter, true).rows.into_iter().next() {
        let edited = col.edit_document(&id, |data| eval_filter(data, filter).then(|| apply_update(data, update)));
        if let Some(changed) = edited {
            report.matched = 1;
            report.modified = u64::from(changed);
            break;
        }
        log::debug!("update_one on {}: match went stale, retrying", col.name_str());
    }
    telemetry::log_write("update_one", col.name_str(), elapsed_ms(start.elapsed()), report.modified);
    report
}

/// Deletes the first match in natural order, re-checked like [`update_one`].
pub fn delete_one(col: &Collection, filter: &Filter) -> DeleteReport {
    let start = Instant::now();
    let mut deleted = 0;
    while let Some((id, _)) = matching(col, filter, true).rows.into_iter().next() {
        if col.delete_document_if(&id, |data| eval_filter(data, filter)) {
            deleted = 1;
            break;
        }
        log::debug!("delete_one on {}: match went stale, retrying", col.name_str());
    }
    telemetry::log_write("delete_one", col.name_str(), elapsed_ms(start.elapsed()), deleted);
    DeleteReport { deleted }
}

fn elapsed_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn ensure_subdoc<'a>(root: &'a mut BsonDocument, key: &str) -> Option<&'a mut BsonDocument> {
    if !matches!(root.get(key), Some(Bson::Document(_))) {
        root.insert(key.to_string(), Bson::Document(BsonDocument::new()));
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => Some(d),
        _ => None,
    }
}

fn parent_of<'a>(root: &'a mut BsonDocument, path: &str) -> Option<(&'a mut BsonDocument, String)> {
    let mut cur = root;
    let mut segments = path.split('.').peekable();
    while let Some(seg) = segments.next() {
        if segments.peek().is_none() {
            return Some((cur, seg.to_string()));
        }
        cur = ensure_subdoc(cur, seg)?;
    }
    None
}

fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> bool {
    let Some((parent, last)) = parent_of(root, path) else { return false };
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
    if get_path(root, path).is_none() {
        return false;
    }
    parent_of(root, path).is_some_and(|(parent, last)| parent.remove(&last).is_some())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_step(by: f64) -> Option<i64> {
    // 2^63 is exact as f64, so the upper check excludes i64::MAX + 1
    (by.fract() == 0.0 && by >= i64::MIN as f64 && by < i64::MAX as f64).then_some(by as i64)
}

/// `$inc` keeps integers integral when both sides are whole numbers and the sum
/// fits in 64 bits; otherwise the result becomes a double.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn inc_path(root: &mut BsonDocument, path: &str, by: f64) -> bool {
    let step = whole_step(by);
    let next = match (get_path(root, path), step) {
        (Some(Bson::Int32(i)), Some(n)) => match i64::from(*i).checked_add(n) {
            Some(sum) => i32::try_from(sum).map_or(Bson::Int64(sum), Bson::Int32),
            None => Bson::Double(f64::from(*i) + by),
        },
        (Some(Bson::Int64(i)), Some(n)) => {
            i.checked_add(n).map_or_else(|| Bson::Double(*i as f64 + by), Bson::Int64)
        }
        (Some(other), _) => Bson::Double(bson_as_f64(other).unwrap_or(0.0) + by),
        (None, Some(n)) => Bson::Int64(n),
        (None, None) => Bson::Double(by),
    };
    set_path(root, path, next)
}

/// Applies `$set`, `$inc` and `$unset` in that order. Returns whether the body changed.
pub fn apply_update(doc: &mut BsonDocument, upd: &UpdateDoc) -> bool {
    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(doc, k, v.clone());
    }
    for (k, by) in &upd.inc {
        changed |= inc_path(doc, k, *by);
    }
    for k in &upd.unset {
        changed |= unset_path(doc, k);
    }
    changed
}
