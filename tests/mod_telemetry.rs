use bson::doc;
use bookstore::Database;
use bookstore::query::telemetry::{
    metrics_text, set_audit_enabled, set_audit_sink_for_tests, set_slow_query_ms,
};
use bookstore::query::{Filter, FindOptions, UpdateDoc};
use bookstore::utils::devlog;
use parking_lot::RwLock;
use std::sync::Arc;

// One test: the telemetry switches are process-wide.
#[test]
fn audit_lines_and_query_metrics() {
    let sink = Arc::new(RwLock::new(Vec::new()));
    set_audit_sink_for_tests(sink.clone());
    set_audit_enabled(true);
    set_slow_query_ms(0);

    let db = Database::new("t");
    let col = db.create_collection("audited");
    let ids = db.insert_many("audited", vec![doc! {"title": "a"}, doc! {"title": "b"}]).unwrap();
    db.update_one("audited", &Filter::eq("title", "a"), &UpdateDoc::set("title", "c")).unwrap();
    db.delete_one("audited", &Filter::eq("title", "b")).unwrap();
    assert_eq!(col.find_document(&ids[0]).unwrap().data.get("title"), Some(&bson::Bson::from("c")));
    assert!(col.find_document(&ids[1]).is_none());

    let lines: Vec<serde_json::Value> = sink
        .read()
        .iter()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["collection"] == "audited")
        .collect();
    let ops: Vec<&str> = lines.iter().map(|v| v["op"].as_str().unwrap()).collect();
    assert_eq!(ops, vec!["insert", "insert", "update", "delete"]);
    assert_eq!(lines[0]["doc_id"], ids[0].to_string());

    let _g = devlog::enable_thread_sink();
    db.find("audited", &Filter::True, &FindOptions::default()).unwrap();
    let metrics: Vec<serde_json::Value> =
        devlog::drain().iter().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["plan"], "COLLSCAN");
    assert_eq!(metrics[0]["returned"], 1);
    assert_eq!(metrics[0]["slow"], true);

    set_audit_enabled(false);
    let before = sink.read().len();
    db.insert_many("audited", vec![doc! {"title": "quiet"}]).unwrap();
    assert_eq!(sink.read().len(), before);
    assert!(metrics_text().contains("bookstore_queries_slow_total"));
}
