//! `Qdrant` vectors + `SQLite` metadata for indexed chunks.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use crate::document_store::{BoxFuture, DocumentStore};
use crate::error::{Result, StoreError};
use crate::sqlite::SqliteStore;
use crate::types::{ChunkRecord, DocumentRecord, RemovedDocuments, ScoredChunk, StoreStats};

const DEFAULT_COLLECTION_PREFIX: &str = "sift_";

/// Dual-write store: chunk vectors live in one `Qdrant` collection per
/// store, everything else in `SQLite`.
///
/// Deletions hit `Qdrant` first so a failure never leaves vectors pointing
/// at metadata that is already gone.
pub struct QdrantStore {
    client: Qdrant,
    prefix: String,
    meta: SqliteStore,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Map a 16-hex-char chunk ID onto a numeric `Qdrant` point ID.
///
/// # Errors
///
/// Returns [`StoreError::InvalidId`] if the ID is not 16 hex characters.
pub fn point_id(chunk_id: &str) -> Result<PointId> {
    if chunk_id.len() != 16 {
        return Err(StoreError::InvalidId(chunk_id.to_owned()));
    }
    u64::from_str_radix(chunk_id, 16)
        .map(PointId::from)
        .map_err(|_| StoreError::InvalidId(chunk_id.to_owned()))
}

fn point_ids(chunk_ids: &[String]) -> Result<Vec<PointId>> {
    chunk_ids.iter().map(|id| point_id(id)).collect()
}

impl QdrantStore {
    /// # Errors
    ///
    /// Returns an error if the `Qdrant` client cannot be built.
    pub fn new(url: &str, meta: SqliteStore) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self {
            client,
            prefix: DEFAULT_COLLECTION_PREFIX.into(),
            meta,
        })
    }

    #[must_use]
    pub fn with_collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn collection_name(&self, store: &str) -> String {
        format!("{}{store}", self.prefix)
    }

    /// Metadata backend shared with lexical search.
    #[must_use]
    pub fn metadata(&self) -> &SqliteStore {
        &self.meta
    }

    async fn ensure_collection(&self, collection: &str, vector_size: u64) -> Result<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        tracing::info!(collection, vector_size, "created qdrant collection");
        Ok(())
    }

    async fn drop_collection(&self, store: &str) -> Result<()> {
        let collection = self.collection_name(store);
        if self
            .client
            .collection_exists(&collection)
            .await
            .map_err(Box::new)?
        {
            self.client
                .delete_collection(&collection)
                .await
                .map_err(Box::new)?;
        }
        Ok(())
    }

    async fn delete_points(&self, store: &str, chunk_ids: &[String]) -> Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let collection = self.collection_name(store);
        if !self
            .client
            .collection_exists(&collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }
        let ids = point_ids(chunk_ids)?;
        self.client
            .delete_points(DeletePointsBuilder::new(&collection).points(PointsIdsList { ids }))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn remove_paths(&self, store: &str, paths: Vec<String>) -> Result<RemovedDocuments> {
        self.meta.ensure_store(store).await?;
        let pending = self.meta.collect_removals(store, &paths).await?;
        self.delete_points(store, &pending.chunk_ids).await?;
        self.meta.delete_documents(store, pending.paths).await
    }

    /// Nearest chunks to `vector`, scored by cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is missing or the `Qdrant` search fails.
    pub async fn search_dense(
        &self,
        store: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.meta.ensure_store(store).await?;
        let collection = self.collection_name(store);
        if limit == 0
            || !self
                .client
                .collection_exists(&collection)
                .await
                .map_err(Box::new)?
        {
            return Ok(Vec::new());
        }
        let limit = u64::try_from(limit)?;
        let results = self
            .client
            .search_points(SearchPointsBuilder::new(&collection, vector, limit).with_payload(true))
            .await
            .map_err(Box::new)?;
        Ok(results.result.iter().filter_map(scored_chunk).collect())
    }
}

fn scored_chunk(point: &ScoredPoint) -> Option<ScoredChunk> {
    let chunk_id = point
        .payload
        .get("chunk_id")
        .and_then(qdrant_client::qdrant::Value::as_str)?
        .clone();
    Some(ScoredChunk {
        chunk_id,
        score: point.score,
    })
}

fn to_point(chunk: &ChunkRecord) -> Result<PointStruct> {
    let vector = chunk
        .vector
        .clone()
        .ok_or_else(|| StoreError::MissingVector(chunk.chunk_id.clone()))?;
    let payload: std::collections::HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::json!({
            "chunk_id": chunk.chunk_id,
            "document_id": chunk.document_id,
            "path": chunk.path,
            "language": chunk.language,
            "node_type": chunk.node_type,
            "start_line": chunk.start_line,
            "end_line": chunk.end_line,
        }))?;
    Ok(PointStruct::new(point_id(&chunk.chunk_id)?, vector, payload))
}

impl DocumentStore for QdrantStore {
    fn create_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        self.meta.create_store(store)
    }

    fn store_exists(&self, store: &str) -> BoxFuture<'_, Result<bool>> {
        self.meta.store_exists(store)
    }

    fn list_stores(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        self.meta.list_stores()
    }

    fn delete_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.drop_collection(&store).await?;
            self.meta.delete_store(&store).await
        })
    }

    fn upsert_document(
        &self,
        store: &str,
        document: DocumentRecord,
    ) -> BoxFuture<'_, Result<()>> {
        self.meta.upsert_document(store, document)
    }

    fn upsert_chunks(&self, store: &str, chunks: Vec<ChunkRecord>) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.meta.ensure_store(&store).await?;
            if chunks.is_empty() {
                return Ok(());
            }
            let points = chunks.iter().map(to_point).collect::<Result<Vec<_>>>()?;
            let dim = chunks
                .iter()
                .find_map(|c| c.vector.as_ref().map(Vec::len))
                .unwrap_or_default();
            let collection = self.collection_name(&store);
            self.ensure_collection(&collection, u64::try_from(dim)?)
                .await?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, points).wait(true))
                .await
                .map_err(Box::new)?;
            self.meta.upsert_chunks(&store, chunks).await
        })
    }

    fn get_document(
        &self,
        store: &str,
        path: &str,
    ) -> BoxFuture<'_, Result<Option<DocumentRecord>>> {
        self.meta.get_document(store, path)
    }

    fn list_documents(&self, store: &str) -> BoxFuture<'_, Result<Vec<DocumentRecord>>> {
        self.meta.list_documents(store)
    }

    fn fetch_chunks(
        &self,
        store: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>>> {
        self.meta.fetch_chunks(store, ids)
    }

    fn delete_chunks(&self, store: &str, ids: Vec<String>) -> BoxFuture<'_, Result<usize>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.meta.ensure_store(&store).await?;
            self.delete_points(&store, &ids).await?;
            self.meta.delete_chunks(&store, ids).await
        })
    }

    fn delete_documents(
        &self,
        store: &str,
        paths: Vec<String>,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        Box::pin(async move { self.remove_paths(&store, paths).await })
    }

    fn delete_by_path_prefix(
        &self,
        store: &str,
        prefix: &str,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        let prefix = prefix.to_owned();
        Box::pin(async move {
            self.meta.ensure_store(&store).await?;
            let paths = self.meta.paths_with_prefix(&store, &prefix).await?;
            self.remove_paths(&store, paths).await
        })
    }

    fn clear(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.meta.ensure_store(&store).await?;
            self.drop_collection(&store).await?;
            self.meta.clear(&store).await
        })
    }

    fn stats(&self, store: &str) -> BoxFuture<'_, Result<StoreStats>> {
        self.meta.stats(store)
    }
}
