use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Target of the per-query JSON lines; routed to its own appender by the logger.
pub const METRICS_TARGET: &str = "bookstore::metrics";
/// Target of document write events.
pub const AUDIT_TARGET: &str = "bookstore::audit";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub enable_audit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("BOOKSTORE_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(500);
        Self { slow_query_ms: slow, enable_audit: true }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub audits_total: AtomicU64,
}

#[derive(Default)]
struct Telemetry {
    cfg: RwLock<TelemetryConfig>,
    metrics: Metrics,
    // tests capture audit lines here
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

static TELEMETRY: std::sync::LazyLock<Telemetry> = std::sync::LazyLock::new(Telemetry::default);

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}

pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}

pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

/// One executed read, as written to the metrics log.
#[derive(Debug, Serialize)]
pub struct QueryEvent<'a> {
    pub op: &'a str,
    pub collection: &'a str,
    pub plan: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<&'a str>,
    pub duration_ms: u64,
    pub returned: usize,
    pub keys_examined: usize,
    pub docs_examined: usize,
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn emit_metrics_line(line: &str) {
    crate::devlog!("{line}");
    log::info!(target: METRICS_TARGET, "{line}");
}

pub fn log_query(event: &QueryEvent<'_>) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let slow = event.duration_ms >= TELEMETRY.cfg.read().slow_query_ms;
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!("slow {} on {}: {} ms", event.op, event.collection, event.duration_ms);
    }
    match serde_json::to_value(event) {
        Ok(mut v) => {
            v["ts"] = serde_json::Value::String(now_ts());
            v["slow"] = serde_json::Value::Bool(slow);
            emit_metrics_line(&v.to_string());
        }
        Err(e) => log::error!("failed to encode query event: {e}"),
    }
}

/// Records an aggregation run.
pub fn log_pipeline(collection: &str, stages: usize, input: usize, output: usize, duration_ms: u64) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": "aggregate", "collection": collection, "stages": stages,
        "input": input, "returned": output, "duration_ms": duration_ms
    })
    .to_string();
    emit_metrics_line(&line);
}

/// Records an update/delete statement (the per-document events go through [`log_audit`]).
pub fn log_write(op: &str, collection: &str, duration_ms: u64, affected: u64) {
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "collection": collection,
        "duration_ms": duration_ms, "affected": affected
    })
    .to_string();
    emit_metrics_line(&line);
}

pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    TELEMETRY.metrics.audits_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "collection": collection, "doc_id": doc_id
    })
    .to_string();
    let sink = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = sink {
        sink.write().push(line.clone());
    }
    log::info!(target: AUDIT_TARGET, "{line}");
}

#[must_use]
pub fn metrics_text() -> String {
    let m = &TELEMETRY.metrics;
    format!(
        "bookstore_queries_total {}\n\
         bookstore_queries_slow_total {}\n\
         bookstore_writes_total {}\n\
         bookstore_audits_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.writes_total.load(Ordering::Relaxed),
        m.audits_total.load(Ordering::Relaxed),
    )
}
