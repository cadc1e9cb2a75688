//! Library error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("no embeddings available to build index")]
    EmptyIndex,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("input text is empty")]
    EmptyInput,

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index has {vectors} vectors but {ids} ids")]
    IdCountMismatch { vectors: usize, ids: usize },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
