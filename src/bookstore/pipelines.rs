//! The fixed statements of the bookstore: three pipelines and two index key patterns.

use bson::{Document as BsonDocument, doc};

/// Mean price per genre.
#[must_use]
pub fn average_price_by_genre() -> Vec<BsonDocument> {
    vec![doc! { "$group": { "_id": "$genre", "averagePrice": { "$avg": "$price" } } }]
}

/// Author with the most books. No secondary sort key: among tied authors the
/// first group in natural order wins.
#[must_use]
pub fn most_prolific_author() -> Vec<BsonDocument> {
    vec![
        doc! { "$group": { "_id": "$author", "totalBooks": { "$sum": 1 } } },
        doc! { "$sort": { "totalBooks": -1 } },
        doc! { "$limit": 1 },
    ]
}

/// Book count per publication decade, oldest first.
#[must_use]
pub fn count_by_decade() -> Vec<BsonDocument> {
    vec![
        doc! {
            "$group": {
                "_id": {
                    "decade": {
                        "$multiply": [
                            { "$floor": { "$divide": ["$published_year", 10] } },
                            10
                        ]
                    }
                },
                "count": { "$sum": 1 }
            }
        },
        doc! { "$sort": { "_id.decade": 1 } },
    ]
}

#[must_use]
pub fn title_index() -> BsonDocument {
    doc! { "title": 1 }
}

#[must_use]
pub fn author_year_index() -> BsonDocument {
    doc! { "author": 1, "published_year": 1 }
}
