use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{ChunkRecord, DocumentRecord, RemovedDocuments, StoreStats};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Upsert/query/delete backend holding documents and their chunks.
///
/// Every method is scoped to one named store. Each individual call is
/// atomic at most; callers sequencing several writes must not assume a
/// transaction spanning them.
pub trait DocumentStore: Send + Sync {
    /// Create an empty store. Idempotent.
    fn create_store(&self, store: &str) -> BoxFuture<'_, Result<()>>;

    fn store_exists(&self, store: &str) -> BoxFuture<'_, Result<bool>>;

    fn list_stores(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Drop a store with everything in it. Missing stores are a no-op.
    fn delete_store(&self, store: &str) -> BoxFuture<'_, Result<()>>;

    /// Insert or replace the document entry keyed by its path.
    fn upsert_document(&self, store: &str, document: DocumentRecord)
    -> BoxFuture<'_, Result<()>>;

    /// Insert or replace chunks keyed by chunk ID.
    fn upsert_chunks(&self, store: &str, chunks: Vec<ChunkRecord>) -> BoxFuture<'_, Result<()>>;

    fn get_document(&self, store: &str, path: &str)
    -> BoxFuture<'_, Result<Option<DocumentRecord>>>;

    /// All documents in the store, ordered by path.
    fn list_documents(&self, store: &str) -> BoxFuture<'_, Result<Vec<DocumentRecord>>>;

    /// Chunks for the given IDs; unknown IDs are skipped.
    fn fetch_chunks(&self, store: &str, ids: Vec<String>)
    -> BoxFuture<'_, Result<Vec<ChunkRecord>>>;

    /// Delete chunks by ID, returning how many existed.
    fn delete_chunks(&self, store: &str, ids: Vec<String>) -> BoxFuture<'_, Result<usize>>;

    /// Delete document entries and every chunk they own.
    fn delete_documents(
        &self,
        store: &str,
        paths: Vec<String>,
    ) -> BoxFuture<'_, Result<RemovedDocuments>>;

    /// Delete every document whose path starts with `prefix`, with its chunks.
    fn delete_by_path_prefix(
        &self,
        store: &str,
        prefix: &str,
    ) -> BoxFuture<'_, Result<RemovedDocuments>>;

    /// Remove all documents and chunks, keeping the store itself.
    fn clear(&self, store: &str) -> BoxFuture<'_, Result<()>>;

    fn stats(&self, store: &str) -> BoxFuture<'_, Result<StoreStats>>;
}
