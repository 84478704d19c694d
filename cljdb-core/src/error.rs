//! Error types for cljdb-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt page: {0}")]
    CorruptPage(String),

    #[error("row too large: {0}")]
    RowTooLarge(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOp(String),

    #[error("missing step: {0}")]
    MissingStep(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("CSV error: {0}")]
    Csv(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Catalog(e.to_string())
    }
}
