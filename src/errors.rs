use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Duplicate _id: {0}")]
    DuplicateId(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),
}
