use bson::Document as BsonDocument;
use serde::Serialize;
use std::io::Write;

use super::command::{Command, Report};
use crate::Database;
use crate::bookstore::{BookStore, run_script};
use crate::config::AppConfig;
use crate::errors::DbError;
use crate::query::{self, FindOptions, Projection, SortSpec};

pub use crate::config::OutputFormat as OutputMode;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn emit<T: Serialize + ?Sized>(out: &mut dyn Write, mode: OutputMode, value: &T) -> CliResult {
    let line = match mode {
        OutputMode::Ndjson => serde_json::to_string(value)?,
        OutputMode::Pretty => serde_json::to_string_pretty(value)?,
    };
    writeln!(out, "{line}")?;
    Ok(())
}

/// One line (or pretty block) per row.
fn emit_rows<T: Serialize>(out: &mut dyn Write, mode: OutputMode, rows: &[T]) -> CliResult {
    for row in rows {
        emit(out, mode, row)?;
    }
    Ok(())
}

fn json_document(json: &str) -> Result<BsonDocument, serde_json::Error> {
    serde_json::from_str::<BsonDocument>(json)
}

/// `--no-id` on its own still drops `_id` from whole documents.
fn projection(fields: Option<String>, no_id: bool) -> Option<Projection> {
    let fields: Vec<String> = fields
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if fields.is_empty() && !no_id {
        return None;
    }
    Some(Projection { fields, include_id: !no_id })
}

fn sort_keys(sort: Option<String>) -> Result<Option<Vec<SortSpec>>, DbError> {
    Ok(sort.as_deref().map(query::parse_sort_list).transpose()?.filter(|s| !s.is_empty()))
}

/// Executes one command against an already populated store.
///
/// # Errors
/// Malformed JSON, filters, updates or pipelines, and write failures on `out`.
pub fn run(store: &BookStore, cmd: Command, mode: OutputMode, out: &mut dyn Write) -> CliResult {
    let db = store.database();
    let col = store.collection_name();
    match cmd {
        Command::Run => {
            let report = run_script(store)?;
            emit_rows(out, mode, &report.steps)
        }
        Command::Find { filter_json, project, no_id, sort, limit, skip } => {
            let filter = json_document(&filter_json)?;
            let opts = FindOptions {
                projection: projection(project, no_id),
                sort: sort_keys(sort)?,
                limit,
                skip,
            };
            emit_rows(out, mode, &store.find_raw(&filter, &opts)?)
        }
        Command::Count { filter_json } => {
            let n = store.count(&json_document(&filter_json)?)?;
            emit(out, mode, &serde_json::json!({ "count": n }))
        }
        Command::UpdateOne { filter_json, update_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let update = query::parse_update_json(&update_json)?;
            emit(out, mode, &db.update_one(col, &filter, &update)?)
        }
        Command::DeleteOne { filter_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            emit(out, mode, &db.delete_one(col, &filter)?)
        }
        Command::Aggregate { pipeline_json } => {
            let pipeline = query::parse_pipeline_json(&pipeline_json)?;
            emit_rows(out, mode, &db.aggregate(col, &pipeline)?)
        }
        Command::Report(Report::AveragePrice) => emit_rows(out, mode, &store.average_price_by_genre()?),
        Command::Report(Report::TopAuthor) => match store.most_prolific_author()? {
            Some(top) => emit(out, mode, &top),
            None => Ok(()),
        },
        Command::Report(Report::Decades) => emit_rows(out, mode, &store.count_by_decade()?),
        Command::Page { n, sort } => {
            emit_rows(out, mode, &store.page_sorted(n, sort_keys(sort)?)?)
        }
        Command::Indexes => {
            store.create_indexes()?;
            emit_rows(out, mode, &db.list_indexes(col)?)
        }
        Command::Explain { filter_json, with_indexes } => {
            if with_indexes {
                store.create_indexes()?;
            }
            emit(out, mode, &store.explain(&json_document(&filter_json)?)?)
        }
    }
}

/// Builds a fresh in-memory store from `cfg` and runs `cmd` against it. The
/// sample books are loaded first, except for `run`, which loads them itself.
///
/// # Errors
/// See [`run`].
pub fn run_seeded(cfg: &AppConfig, cmd: Command, out: &mut dyn Write) -> CliResult {
    let store = BookStore::new(Database::new(cfg.database()), cfg.collection(), cfg.page_size());
    if cmd != Command::Run {
        store.provision();
        store.seed()?;
    }
    log::debug!("running {cmd:?} against {}", store.database().namespace(store.collection_name()));
    run(&store, cmd, cfg.format(), out)
}
