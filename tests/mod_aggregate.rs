use bson::{Bson, doc};
use bookstore::Database;
use bookstore::aggregate::{Pipeline, Stage};
use bookstore::errors::DbError;
use bookstore::query::parse_pipeline_json;

fn sales() -> Vec<bson::Document> {
    vec![
        doc! {"item": "pen", "qty": 2, "price": 1.5, "year": 1999},
        doc! {"item": "ink", "qty": 1, "price": 4.0, "year": 2004},
        doc! {"item": "pen", "qty": 5, "price": 1.5, "year": 2001},
        doc! {"item": "pad", "qty": 3, "price": 2.25, "year": 1987},
    ]
}

fn run(stages: &[bson::Document]) -> Vec<bson::Document> {
    Pipeline::parse(stages).unwrap().run(sales())
}

#[test]
fn group_sum_keeps_first_seen_order() {
    let out = run(&[doc! {"$group": {"_id": "$item", "total": {"$sum": "$qty"}}}]);
    assert_eq!(
        out,
        vec![
            doc! {"_id": "pen", "total": 7_i64},
            doc! {"_id": "ink", "total": 1_i64},
            doc! {"_id": "pad", "total": 3_i64},
        ]
    );
}

#[test]
fn avg_min_max_and_count() {
    let out = run(&[doc! {"$group": {
        "_id": null,
        "avg": {"$avg": "$price"},
        "lo": {"$min": "$qty"},
        "hi": {"$max": "$qty"},
        "n": {"$count": {}},
    }}]);
    assert_eq!(out.len(), 1);
    let row = &out[0];
    assert_eq!(row.get("_id"), Some(&Bson::Null));
    assert_eq!(row.get("avg"), Some(&Bson::Double((1.5 + 4.0 + 1.5 + 2.25) / 4.0)));
    assert_eq!(row.get("lo"), Some(&Bson::Int32(1)));
    assert_eq!(row.get("hi"), Some(&Bson::Int32(5)));
    assert_eq!(row.get("n"), Some(&Bson::Int64(4)));
}

#[test]
fn decade_bucket_sorted_ascending() {
    let out = run(&[
        doc! {"$group": {
            "_id": {"decade": {"$multiply": [{"$floor": {"$divide": ["$year", 10]}}, 10]}},
            "count": {"$sum": 1},
        }},
        doc! {"$sort": {"_id.decade": 1}},
    ]);
    let decades: Vec<Bson> = out.iter().map(|d| d.get_document("_id").unwrap().get("decade").unwrap().clone()).collect();
    assert_eq!(decades, vec![Bson::Int64(1980), Bson::Int64(1990), Bson::Int64(2000)]);
    assert_eq!(out[2].get("count"), Some(&Bson::Int64(2)));
}

#[test]
fn match_sort_skip_limit_project() {
    let out = run(&[
        doc! {"$match": {"item": {"$ne": "ink"}}},
        doc! {"$sort": {"qty": -1}},
        doc! {"$skip": 1},
        doc! {"$limit": 1},
        doc! {"$project": {"_id": 0, "item": 1, "value": {"$multiply": ["$qty", "$price"]}}},
    ]);
    assert_eq!(out, vec![doc! {"item": "pad", "value": 6.75}]);
}

#[test]
fn sort_then_limit_keeps_first_of_ties() {
    let out = run(&[
        doc! {"$group": {"_id": "$price", "n": {"$sum": 1}}},
        doc! {"$sort": {"n": -1}},
        doc! {"$limit": 1},
    ]);
    assert_eq!(out, vec![doc! {"_id": 1.5, "n": 2_i64}]);

    let out = run(&[
        doc! {"$group": {"_id": "$year", "n": {"$sum": 1}}},
        doc! {"$sort": {"n": -1}},
        doc! {"$limit": 1},
    ]);
    assert_eq!(out[0].get("_id"), Some(&Bson::Int32(1999)));
}

#[test]
fn malformed_stages_are_pipeline_errors() {
    for bad in [
        doc! {"$bucket": {}},
        doc! {"$group": {"total": {"$sum": 1}}},
        doc! {"$group": {"_id": "$a", "x": {"$median": "$b"}}},
        doc! {"$limit": -1},
        doc! {"$sort": {}},
        doc! {"$match": {"a": 1}, "$limit": 1},
    ] {
        assert!(matches!(Pipeline::parse(&[bad]), Err(DbError::PipelineError(_))));
    }
}

#[test]
fn pipeline_from_json_against_database() {
    let db = Database::new("shop");
    db.create_collection("sales");
    db.insert_many("sales", sales()).unwrap();
    let stages = parse_pipeline_json(r#"[{"$match": {"year": {"$gt": 2000}}}, {"$group": {"_id": "$item"}}]"#).unwrap();
    let parsed = Pipeline::parse(&stages).unwrap();
    assert!(matches!(parsed.stages[0], Stage::Match(_)));
    assert_eq!(parsed.stages[1].name(), "$group");

    let out = db.aggregate("sales", &stages).unwrap();
    assert_eq!(out, vec![doc! {"_id": "ink"}, doc! {"_id": "pen"}]);
    assert!(matches!(db.aggregate("missing", &stages), Err(DbError::NoSuchCollection(_))));
}
