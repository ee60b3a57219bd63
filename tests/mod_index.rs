use bson::doc;
use bookstore::Database;
use bookstore::index::IndexSpec;
use bookstore::query::{Order, Plan, execute, parse_filter_json, plan_query};

fn books_db() -> Database {
    let db = Database::new("plp_bookstore");
    db.create_collection("books");
    db.insert_many(
        "books",
        vec![
            doc! {"title": "The Hobbit", "author": "J.R.R. Tolkien", "published_year": 1937},
            doc! {"title": "Becoming", "author": "Michelle Obama", "published_year": 2018},
            doc! {"title": "Educated", "author": "Tara Westover", "published_year": 2018},
        ],
    )
    .unwrap();
    db
}

#[test]
fn index_names_follow_key_pattern() {
    let spec = IndexSpec::from_keys(&doc! {"author": 1, "published_year": -1}).unwrap();
    assert_eq!(spec.name, "author_1_published_year_-1");
    assert_eq!(spec.keys[1], ("published_year".to_string(), Order::Desc));
    assert!(IndexSpec::from_keys(&doc! {}).is_err());
    assert!(IndexSpec::from_keys(&doc! {"title": "text"}).is_err());
}

#[test]
fn create_index_is_idempotent_and_droppable() {
    let db = books_db();
    assert_eq!(db.create_index("books", &doc! {"title": 1}).unwrap(), "title_1");
    assert_eq!(db.create_index("books", &doc! {"title": 1}).unwrap(), "title_1");
    assert_eq!(db.list_indexes("books").unwrap().len(), 1);
    assert!(db.drop_index("books", "title_1").unwrap());
    assert!(!db.drop_index("books", "title_1").unwrap());
}

#[test]
fn explain_switches_from_collscan_to_ixscan() {
    let db = books_db();
    let filter = doc! {"title": "Educated"};
    let before = db.explain("books", &filter).unwrap();
    assert!(before.is_collection_scan());
    assert_eq!(before.execution_stats.total_docs_examined, 3);
    assert_eq!(before.execution_stats.total_keys_examined, 0);

    db.create_index("books", &doc! {"title": 1}).unwrap();
    let after = db.explain("books", &filter).unwrap();
    assert_eq!(after.query_planner.winning_plan.stage, "FETCH");
    assert_eq!(after.used_index(), Some("title_1"));
    assert_eq!(after.execution_stats.n_returned, 1);
    assert_eq!(after.execution_stats.total_keys_examined, 1);
    assert_eq!(after.query_planner.parsed_query, filter);
}

#[test]
fn compound_index_serves_prefix_and_range() {
    let db = books_db();
    db.create_index("books", &doc! {"author": 1, "published_year": 1}).unwrap();
    let col = db.get_collection("books").unwrap();

    let f = parse_filter_json(r#"{"author": "Tara Westover", "published_year": {"$gte": 2000}}"#).unwrap();
    let run = execute(&col, &f, &Default::default());
    assert_eq!(run.plan.index_name(), Some("author_1_published_year_1"));
    assert_eq!(run.docs.len(), 1);

    // the leading field is not constrained, so the index cannot help
    let f = parse_filter_json(r#"{"published_year": 2018}"#).unwrap();
    assert_eq!(plan_query(&col.indexes.read(), &f), Plan::CollScan);
}

#[test]
fn index_tracks_writes() {
    let db = books_db();
    db.create_index("books", &doc! {"title": 1}).unwrap();
    db.insert_many("books", vec![doc! {"title": "Dune", "author": "Frank Herbert", "published_year": 1965}])
        .unwrap();
    let f = parse_filter_json(r#"{"title": "Dune"}"#).unwrap();
    assert_eq!(db.count("books", &f).unwrap(), 1);
    assert_eq!(db.delete_one("books", &f).unwrap().deleted, 1);
    let e = db.explain("books", &doc! {"title": "Dune"}).unwrap();
    assert_eq!(e.execution_stats.n_returned, 0);
    assert_eq!(e.execution_stats.total_keys_examined, 0);
}

#[test]
fn compound_index_keeps_documents_with_list_values() {
    let db = books_db();
    db.insert_many("books", vec![doc! {"title": "Reissued", "author": "A", "published_year": [1999, 2001]}])
        .unwrap();
    let by_author = parse_filter_json(r#"{"author": "A"}"#).unwrap();
    assert_eq!(db.count("books", &by_author).unwrap(), 1);
    db.create_index("books", &doc! {"author": 1, "published_year": 1}).unwrap();
    assert_eq!(db.count("books", &by_author).unwrap(), 1);

    let col = db.get_collection("books").unwrap();
    assert!(matches!(plan_query(&col.indexes.read(), &by_author), Plan::IndexScan { .. }));
}
