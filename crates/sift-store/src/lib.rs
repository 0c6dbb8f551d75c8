//! Store contract for indexed documents and chunks, with in-memory,
//! `SQLite` (FTS5 lexical search) and `Qdrant` (dense search) backends.

pub mod document_store;
pub mod error;
pub mod in_memory_store;
pub mod qdrant;
pub mod sqlite;
pub mod types;

pub use document_store::{BoxFuture, DocumentStore};
pub use error::{Result, StoreError};
pub use in_memory_store::InMemoryStore;
pub use qdrant::QdrantStore;
pub use sqlite::SqliteStore;
pub use types::{ChunkRecord, DocumentRecord, RemovedDocuments, ScoredChunk, StoreStats, unix_now};
