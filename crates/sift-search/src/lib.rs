//! Rank fusion and hybrid retrieval.
//!
//! [`fuse`] merges any number of ranked lists with weighted Reciprocal Rank
//! Fusion. [`HybridSearcher`] runs a set of [`Retriever`]s concurrently and
//! fuses their output.

pub mod error;
pub mod fusion;
pub mod retriever;

pub use error::{Result, SearchError};
pub use fusion::{DEFAULT_RRF_K, RrfConfig, ScoredResult, effective_weights, fuse, fuse_hybrid};
pub use retriever::{
    DEFAULT_TOP_K, DenseRetriever, HybridSearcher, LexicalRetriever, Retriever, SearchHit,
};
