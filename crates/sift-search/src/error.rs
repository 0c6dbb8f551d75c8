//! Error types for sift-search.

use sift_index::EmbedError;
use sift_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Every configured retriever returned an error.
    #[error("all retrievers failed: {0}")]
    AllRetrieversFailed(String),

    #[error("no retrievers configured")]
    NoRetrievers,
}

/// Result type alias using `SearchError`.
pub type Result<T> = std::result::Result<T, SearchError>;
