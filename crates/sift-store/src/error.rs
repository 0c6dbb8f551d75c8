use std::num::TryFromIntError;

/// Errors raised by a [`DocumentStore`](crate::DocumentStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named store has not been created.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("integer conversion: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// A vector backend received a chunk without an attached embedding.
    #[error("chunk {0} has no vector attached")]
    MissingVector(String),

    #[error("invalid chunk id: {0}")]
    InvalidId(String),

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// `true` when the error only says the store does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreNotFound(_))
    }
}

/// Result type alias using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
