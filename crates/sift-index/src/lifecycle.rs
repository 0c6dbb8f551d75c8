//! Index lifecycle: index, delete, reindex and sync against a document store.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use sift_store::{ChunkRecord, DocumentRecord, DocumentStore, StoreStats, unix_now};
use tokio_util::sync::CancellationToken;

use crate::addressing::{chunk_id, content_hash, document_id};
use crate::chunker::{Chunk, StructuralChunker};
use crate::context::contextualize_for_embedding;
use crate::embed::Embedder;
use crate::error::{EmbedError, IndexError, Result};
use crate::languages::{Lang, detect_language};
use crate::report::{DeleteReport, FileOutcome, FileStatus, IndexReport, SyncReport};
use crate::window::WindowConfig;

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_PATH_LENGTH: usize = 1024;

/// Limits applied to every file before chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub window: WindowConfig,
    pub max_file_size: usize,
    pub max_path_length: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

/// A file handed to the index: store-relative path plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: Vec<u8>,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::from_bytes(path, content.into().into_bytes())
    }

    /// Raw file contents; bytes that are not UTF-8 are indexed as line
    /// windows over a lossy decode.
    #[must_use]
    pub fn from_bytes(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// Text to chunk and the language to chunk it as.
fn decode(path: &str, content: Vec<u8>) -> (String, Lang) {
    match String::from_utf8(content) {
        Ok(text) => (text, detect_language(Path::new(path))),
        Err(e) => {
            tracing::debug!(path, "not valid UTF-8, chunking lossy text as unknown");
            let text = String::from_utf8_lossy(e.as_bytes()).replace('\0', "\u{fffd}");
            (text, Lang::Unknown)
        }
    }
}

/// Orchestrates chunking and store writes, serializing mutations per store.
pub struct IndexManager {
    store: Arc<dyn DocumentStore>,
    chunker: Arc<StructuralChunker>,
    embedder: Option<Arc<dyn Embedder>>,
    options: IndexOptions,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("chunker", &self.chunker)
            .field("options", &self.options)
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_owned()))
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

impl IndexManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        chunker: Arc<StructuralChunker>,
        options: IndexOptions,
    ) -> Self {
        Self {
            store,
            chunker,
            embedder: None,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach vectors produced by `embedder` to every chunk written.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    fn store_lock(&self, store: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(store.to_owned()).or_default())
    }

    async fn require_store(&self, store: &str) -> Result<()> {
        if self.store.store_exists(store).await? {
            Ok(())
        } else {
            Err(IndexError::NotFound(store.to_owned()))
        }
    }

    /// Create an empty store. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    pub async fn create_store(&self, store: &str) -> Result<()> {
        self.store.create_store(store).await?;
        tracing::info!(store, "store created");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    pub async fn list_stores(&self) -> Result<Vec<String>> {
        Ok(self.store.list_stores().await?)
    }

    /// Drop a store and everything in it, waiting for in-flight mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    pub async fn delete_store(&self, store: &str) -> Result<()> {
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;
        self.store.delete_store(store).await?;
        tracing::info!(store, "store deleted");
        Ok(())
    }

    /// Index `files` into `store`.
    ///
    /// Unchanged files (same document ID already stored) are skipped unless
    /// `force` is set. Per-file failures are reported in the returned
    /// report and never abort the batch.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the store does not exist and
    /// [`IndexError::Cancelled`] if `cancel` fires.
    pub async fn index_files(
        &self,
        store: &str,
        files: Vec<SourceFile>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        self.require_store(store).await?;
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;
        self.index_locked(store, files, force, cancel).await
    }

    /// Clear `store` and index `files` from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the store does not exist,
    /// [`IndexError::Cancelled`] if `cancel` fires, or a store error if
    /// clearing fails.
    pub async fn reindex(
        &self,
        store: &str,
        files: Vec<SourceFile>,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        self.require_store(store).await?;
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;
        self.store.clear(store).await?;
        tracing::info!(store, "store cleared for reindex");
        self.index_locked(store, files, true, cancel).await
    }

    async fn index_locked(
        &self,
        store: &str,
        files: Vec<SourceFile>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::new(store);
        let total = files.len();

        for file in files {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let path = file.path.clone();
            match self.index_one(store, file, force, cancel).await {
                Ok(outcome) => report.record(outcome),
                Err(IndexError::Cancelled) => return Err(IndexError::Cancelled),
                Err(IndexError::NotFound(s)) => return Err(IndexError::NotFound(s)),
                Err(e) => {
                    tracing::warn!(store, path = %path, error = %e, "failed to index file");
                    report.record_failure(path, &e);
                }
            }
        }

        report.duration_ms = elapsed_ms(start);
        tracing::info!(
            store,
            files = total,
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            chunks = report.chunks_total,
            duration_ms = report.duration_ms,
            "index batch complete"
        );
        Ok(report)
    }

    fn validate(&self, file: &SourceFile) -> Result<()> {
        if file.path.is_empty() {
            return Err(IndexError::InvalidDocument("empty path".into()));
        }
        if file.path.len() > self.options.max_path_length {
            return Err(IndexError::InvalidDocument(format!(
                "path longer than {} bytes",
                self.options.max_path_length
            )));
        }
        if file.content.len() > self.options.max_file_size {
            return Err(IndexError::InvalidDocument(format!(
                "{} bytes exceeds limit of {}",
                file.content.len(),
                self.options.max_file_size
            )));
        }
        Ok(())
    }

    async fn index_one(
        &self,
        store: &str,
        file: SourceFile,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome> {
        self.validate(&file)?;

        let hash = content_hash(&file.content);
        let doc_id = document_id(&file.path, &hash);
        let existing = self.store.get_document(store, &file.path).await?;

        if !force
            && let Some(doc) = existing.as_ref().filter(|d| d.document_id == doc_id)
        {
            tracing::debug!(store, path = %file.path, "unchanged, skipping");
            return Ok(FileOutcome {
                path: file.path,
                document_id: doc_id,
                status: FileStatus::Skipped,
                chunks: doc.chunk_ids.len(),
                error: None,
            });
        }

        let SourceFile { path, content } = file;
        let (text, lang) = decode(&path, content);
        let chunker = Arc::clone(&self.chunker);
        let window = self.options.window;
        let task_cancel = cancel.clone();
        let chunks: Vec<Chunk> = tokio::task::spawn_blocking(move || {
            chunker.chunk_with_fallback(&text, lang, window, &task_cancel)
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))??;

        let mut records: Vec<ChunkRecord> = chunks
            .iter()
            .map(|c| ChunkRecord {
                chunk_id: chunk_id(&path, c.start_line, c.end_line),
                document_id: doc_id.clone(),
                path: path.clone(),
                language: lang.id().to_owned(),
                node_type: c.node_type.clone(),
                start_line: c.start_line,
                end_line: c.end_line,
                content: c.content.clone(),
                symbols: c.symbols.clone(),
                vector: None,
            })
            .collect();

        if let Some(embedder) = &self.embedder {
            self.attach_vectors(embedder.as_ref(), &path, &chunks, &mut records)
                .await?;
        }

        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        if existing.is_some() {
            let removed = self.store.delete_documents(store, vec![path.clone()]).await?;
            tracing::debug!(
                store,
                path = %path,
                stale_chunks = removed.chunk_ids.len(),
                "replaced previous version"
            );
        }

        let new_ids: Vec<String> = records.iter().map(|r| r.chunk_id.clone()).collect();
        let chunk_count = records.len();

        if let Err(e) = self.store.upsert_chunks(store, records).await {
            self.discard_chunks(store, &path, new_ids).await;
            return Err(e.into());
        }

        let document = DocumentRecord {
            document_id: doc_id.clone(),
            path: path.clone(),
            content_hash: hash,
            language: lang.id().to_owned(),
            indexed_at: unix_now(),
            chunk_ids: Vec::new(),
        };
        if let Err(e) = self.store.upsert_document(store, document).await {
            self.discard_chunks(store, &path, new_ids).await;
            return Err(e.into());
        }

        tracing::debug!(store, path = %path, chunks = chunk_count, "indexed");
        Ok(FileOutcome {
            path,
            document_id: doc_id,
            status: FileStatus::Indexed,
            chunks: chunk_count,
            error: None,
        })
    }

    async fn attach_vectors(
        &self,
        embedder: &dyn Embedder,
        path: &str,
        chunks: &[Chunk],
        records: &mut [ChunkRecord],
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks
            .iter()
            .map(|c| contextualize_for_embedding(path, c))
            .collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(EmbedError(format!(
                "{} returned {} vectors for {} chunks",
                embedder.name(),
                vectors.len(),
                records.len()
            ))
            .into());
        }
        for (record, vector) in records.iter_mut().zip(vectors) {
            record.vector = Some(vector);
        }
        Ok(())
    }

    /// Best-effort removal of chunks whose document write did not land.
    async fn discard_chunks(&self, store: &str, path: &str, ids: Vec<String>) {
        if let Err(e) = self.store.delete_chunks(store, ids).await {
            tracing::warn!(store, path, error = %e, "failed to discard partially written chunks");
        }
    }

    /// Delete documents by exact path and, when given, by path prefix.
    ///
    /// Unknown paths and a missing store are no-ops. An empty prefix is
    /// ignored rather than matching every document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects a delete.
    pub async fn delete_files(
        &self,
        store: &str,
        paths: Vec<String>,
        path_prefix: Option<&str>,
    ) -> Result<DeleteReport> {
        if !self.store.store_exists(store).await? {
            tracing::debug!(store, "delete on missing store ignored");
            return Ok(DeleteReport::default());
        }
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;

        let mut removed = self.store.delete_documents(store, paths).await?;
        if let Some(prefix) = path_prefix.filter(|p| !p.is_empty()) {
            removed.merge(self.store.delete_by_path_prefix(store, prefix).await?);
        }

        tracing::info!(
            store,
            documents = removed.paths.len(),
            chunks = removed.chunk_ids.len(),
            "documents deleted"
        );
        Ok(DeleteReport {
            documents_removed: removed.paths.len(),
            chunks_removed: removed.chunk_ids.len(),
            paths: removed.paths,
        })
    }

    /// Remove every document whose path is not in `current_paths`.
    ///
    /// Only removes; files missing from the store are not added.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the store does not exist, or a
    /// store error if listing or deleting fails.
    pub async fn sync_deleted_files<I, S>(&self, store: &str, current_paths: I) -> Result<SyncReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current: HashSet<String> = current_paths.into_iter().map(Into::into).collect();
        self.sync_missing_files(store, |path| current.contains(path))
            .await
    }

    /// Remove every document for which `is_present` returns false.
    ///
    /// The predicate runs under the store lock, against the paths stored
    /// at that moment.
    ///
    /// # Errors
    ///
    /// Same as [`IndexManager::sync_deleted_files`].
    pub async fn sync_missing_files<F>(&self, store: &str, is_present: F) -> Result<SyncReport>
    where
        F: Fn(&str) -> bool,
    {
        self.require_store(store).await?;
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;

        let stale: Vec<String> = self
            .store
            .list_documents(store)
            .await?
            .into_iter()
            .map(|d| d.path)
            .filter(|p| !is_present(p))
            .collect();

        if stale.is_empty() {
            return Ok(SyncReport::default());
        }

        let removed = self.store.delete_documents(store, stale).await?;
        tracing::info!(
            store,
            removed = removed.paths.len(),
            chunks = removed.chunk_ids.len(),
            "sync removed deleted files"
        );
        Ok(SyncReport {
            removed: removed.paths,
            chunks_removed: removed.chunk_ids.len(),
        })
    }

    /// Counters for `store`. Does not take the mutation lock.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the store does not exist.
    pub async fn stats(&self, store: &str) -> Result<StoreStats> {
        Ok(self.store.stats(store).await?)
    }
}
