use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

use crate::errors::DbError;
use crate::query::{bson_as_f64, bson_as_i64, get_path};
use crate::types::ID_FIELD;

fn field<'a>(d: &'a BsonDocument, path: &str) -> Result<&'a Bson, DbError> {
    get_path(d, path).ok_or_else(|| DbError::Decode(format!("missing field '{path}'")))
}

fn str_field(d: &BsonDocument, path: &str) -> Result<String, DbError> {
    field(d, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DbError::Decode(format!("field '{path}' is not a string")))
}

fn int_field(d: &BsonDocument, path: &str) -> Result<i64, DbError> {
    bson_as_i64(field(d, path)?).ok_or_else(|| DbError::Decode(format!("field '{path}' is not an integer")))
}

fn i32_field(d: &BsonDocument, path: &str) -> Result<i32, DbError> {
    i32::try_from(int_field(d, path)?).map_err(|_| DbError::Decode(format!("field '{path}' out of range")))
}

fn f64_field(d: &BsonDocument, path: &str) -> Result<f64, DbError> {
    bson_as_f64(field(d, path)?).ok_or_else(|| DbError::Decode(format!("field '{path}' is not a number")))
}

fn bool_field(d: &BsonDocument, path: &str) -> Result<bool, DbError> {
    field(d, path)?.as_bool().ok_or_else(|| DbError::Decode(format!("field '{path}' is not a boolean")))
}

/// One book record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: i32,
    pub publisher: String,
}

impl Book {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i32,
        price: f64,
        in_stock: bool,
        pages: i32,
        publisher: &str,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
            published_year,
            price,
            in_stock,
            pages,
            publisher: publisher.into(),
        }
    }

    /// Stored form. Years and pages are int32, the price a double.
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        let mut d = BsonDocument::new();
        if let Some(id) = &self.id {
            d.insert(ID_FIELD, id.as_str());
        }
        d.insert("title", self.title.as_str());
        d.insert("author", self.author.as_str());
        d.insert("genre", self.genre.as_str());
        d.insert("published_year", self.published_year);
        d.insert("price", self.price);
        d.insert("in_stock", self.in_stock);
        d.insert("pages", self.pages);
        d.insert("publisher", self.publisher.as_str());
        d
    }
}

impl TryFrom<&BsonDocument> for Book {
    type Error = DbError;

    fn try_from(d: &BsonDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: d.get(ID_FIELD).and_then(Bson::as_str).map(str::to_string),
            title: str_field(d, "title")?,
            author: str_field(d, "author")?,
            genre: str_field(d, "genre")?,
            published_year: i32_field(d, "published_year")?,
            price: f64_field(d, "price")?,
            in_stock: bool_field(d, "in_stock")?,
            pages: i32_field(d, "pages")?,
            publisher: str_field(d, "publisher")?,
        })
    }
}

/// `{title, author, price}` row of the projected listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedTitle {
    pub title: String,
    pub author: String,
    pub price: f64,
}

impl TryFrom<&BsonDocument> for PricedTitle {
    type Error = DbError;

    fn try_from(d: &BsonDocument) -> Result<Self, Self::Error> {
        Ok(Self { title: str_field(d, "title")?, author: str_field(d, "author")?, price: f64_field(d, "price")? })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreAveragePrice {
    pub genre: String,
    pub average_price: f64,
}

impl TryFrom<&BsonDocument> for GenreAveragePrice {
    type Error = DbError;

    fn try_from(d: &BsonDocument) -> Result<Self, Self::Error> {
        Ok(Self { genre: str_field(d, ID_FIELD)?, average_price: f64_field(d, "averagePrice")? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorTotal {
    pub author: String,
    pub total_books: i64,
}

impl TryFrom<&BsonDocument> for AuthorTotal {
    type Error = DbError;

    fn try_from(d: &BsonDocument) -> Result<Self, Self::Error> {
        Ok(Self { author: str_field(d, ID_FIELD)?, total_books: int_field(d, "totalBooks")? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecadeCount {
    pub decade: i64,
    pub count: i64,
}

impl TryFrom<&BsonDocument> for DecadeCount {
    type Error = DbError;

    fn try_from(d: &BsonDocument) -> Result<Self, Self::Error> {
        Ok(Self { decade: int_field(d, "_id.decade")?, count: int_field(d, "count")? })
    }
}

/// Decodes every row, failing on the first one that does not fit `T`.
///
/// # Errors
/// Returns the first `DbError::Decode` encountered.
pub fn decode_all<T>(docs: &[BsonDocument]) -> Result<Vec<T>, DbError>
where
    T: for<'a> TryFrom<&'a BsonDocument, Error = DbError>,
{
    docs.iter().map(T::try_from).collect()
}
