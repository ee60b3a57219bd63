use bookstore::bookstore::BookStore;
use bookstore::cli::{Command, OutputMode, Report, run, run_seeded};
use bookstore::config::{AppConfig, OutputFormat};
use serde_json::{Value, json};

fn run_lines(cfg: &AppConfig, cmd: Command) -> Vec<Value> {
    let mut buf = Vec::new();
    run_seeded(cfg, cmd, &mut buf).unwrap();
    String::from_utf8(buf).unwrap().lines().map(|l| serde_json::from_str(l).unwrap()).collect()
}

fn defaults() -> AppConfig {
    AppConfig::default()
}

#[test]
fn run_prints_every_script_step() {
    let steps = run_lines(&defaults(), Command::Run);
    assert_eq!(steps.len(), 19);
    assert_eq!(steps[0]["name"], "create_collection");
    assert_eq!(steps[1]["result"]["insertedCount"], 10);
    let avg = steps.iter().find(|s| s["name"] == "average_price_by_genre").unwrap();
    assert_eq!(avg["task"], 4);
}

#[test]
fn find_sorts_and_limits() {
    let rows = run_lines(
        &defaults(),
        Command::Find {
            filter_json: "{}".into(),
            project: Some("title,price".into()),
            no_id: true,
            sort: Some("-price".into()),
            limit: Some(2),
            skip: None,
        },
    );
    assert_eq!(
        rows,
        vec![json!({"title": "The Midnight Library", "price": 17.99}), json!({"title": "Becoming", "price": 16.99})]
    );
}

#[test]
fn update_then_delete_report_counts() {
    let rows = run_lines(
        &defaults(),
        Command::UpdateOne {
            filter_json: r#"{"title":"The Great Gatsby"}"#.into(),
            update_json: r#"{"$set":{"price":13.49}}"#.into(),
        },
    );
    assert_eq!(rows, vec![json!({"matched": 1, "modified": 1})]);
    let rows = run_lines(&defaults(), Command::DeleteOne { filter_json: r#"{"title":"Dune"}"#.into() });
    assert_eq!(rows, vec![json!({"deleted": 0})]);
}

#[test]
fn reports_use_typed_rows() {
    let top = run_lines(&defaults(), Command::Report(Report::TopAuthor));
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["total_books"], 1);
    let decades = run_lines(&defaults(), Command::Report(Report::Decades));
    assert_eq!(decades[0], json!({"decade": 1920, "count": 1}));
    assert_eq!(decades.len(), 7);
    let genres = run_lines(&defaults(), Command::Report(Report::AveragePrice));
    assert!(genres.iter().any(|g| g["genre"] == "Fiction"));
}

#[test]
fn page_size_comes_from_config() {
    let cfg = AppConfig { page_size: Some(3), ..AppConfig::default() };
    assert_eq!(run_lines(&cfg, Command::Page { n: 1, sort: None }).len(), 3);
    assert_eq!(run_lines(&cfg, Command::Page { n: 4, sort: None }).len(), 1);
    let mut buf = Vec::new();
    assert!(run_seeded(&cfg, Command::Page { n: 0, sort: None }, &mut buf).is_err());
}

#[test]
fn aggregate_and_explain() {
    let rows = run_lines(
        &defaults(),
        Command::Aggregate {
            pipeline_json: r#"[{"$match":{"genre":"Fantasy"}},{"$group":{"_id":"$genre","n":{"$sum":1}}}]"#.into(),
        },
    );
    assert_eq!(rows, vec![json!({"_id": "Fantasy", "n": 2})]);

    let plan = run_lines(
        &defaults(),
        Command::Explain { filter_json: r#"{"title":"The Hobbit"}"#.into(), with_indexes: false },
    );
    assert_eq!(plan[0]["queryPlanner"]["winningPlan"]["stage"], "COLLSCAN");
    assert_eq!(plan[0]["queryPlanner"]["namespace"], "plp_bookstore.books");
    assert_eq!(plan[0]["executionStats"]["totalDocsExamined"], 10);
}

#[test]
fn indexes_lists_both() {
    let rows = run_lines(&defaults(), Command::Indexes);
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["author_1_published_year_1", "title_1"]);
}

#[test]
fn malformed_json_is_an_error() {
    let mut buf = Vec::new();
    assert!(run_seeded(&defaults(), Command::Count { filter_json: "{not json".into() }, &mut buf).is_err());
    assert!(
        run_seeded(&defaults(), Command::Aggregate { pipeline_json: r#"[{"$nope":1}]"#.into() }, &mut buf)
            .is_err()
    );
}

#[test]
fn pretty_output_is_indented() {
    let store = BookStore::in_memory();
    store.provision();
    store.seed().unwrap();
    let mut buf = Vec::new();
    run(&store, Command::Count { filter_json: "{}".into() }, OutputMode::Pretty, &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "{\n  \"count\": 10\n}\n");
    assert_eq!(OutputMode::default(), OutputFormat::Ndjson);
}
