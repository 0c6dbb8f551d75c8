//! Error types for sift-index.

use sift_store::StoreError;

/// Failure reported by an [`Embedder`](crate::embed::Embedder).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EmbedError(pub String);

/// Errors that can occur during chunking and index lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No grammar is registered for the language and no fallback applies.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The grammar could not produce a tree for this input.
    #[error("parse failed: {0}")]
    Parse(String),

    /// The backing store rejected a call.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The named store does not exist.
    #[error("store not found: {0}")]
    NotFound(String),

    /// The operation observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// A file failed size or path validation before chunking.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A blocking chunking task panicked or was aborted.
    #[error("chunking task failed: {0}")]
    Task(String),
}

impl From<StoreError> for IndexError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StoreNotFound(store) => Self::NotFound(store),
            other => Self::Store(other),
        }
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
