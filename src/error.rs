use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DepotError>;

#[derive(Error, Debug)]
pub enum DepotError {
    #[error("{0} not found")]
    NotFound(String), // Contains the missing owner/path or digest

    #[error("conflicting update: {0}")]
    Conflict(String), // Contains the contended owner/path

    #[error("invalid name: {0}")]
    NameInvalid(String),

    #[error("invalid content size: {0}")]
    SizeInvalid(String),

    #[error("content of {expected} hashes to {actual}")]
    Integrity { expected: String, actual: String },

    #[error("storage backend unavailable: {source}")]
    StorageUnavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DepotError {
    pub fn unavailable(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::StorageUnavailable {
            source: source.into(),
        }
    }

    /// Whether a bounded retry with backoff is worth attempting. Only backend
    /// outages qualify; `Integrity` in particular must never be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<sqlx::Error> for DepotError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            other => Self::unavailable(other),
        }
    }
}

impl From<io::Error> for DepotError {
    fn from(err: io::Error) -> Self {
        Self::unavailable(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DepotError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::unavailable(err)
    }
}
