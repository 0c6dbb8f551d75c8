//! Retriever collaborators and the hybrid searcher that fuses them.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use sift_index::Embedder;
use sift_store::{BoxFuture, ChunkRecord, DocumentStore, QdrantStore, ScoredChunk, SqliteStore};

use crate::error::{Result, SearchError};
use crate::fusion::{DEFAULT_RRF_K, ScoredResult, fuse};

/// Default number of results fetched from each retriever before fusion.
pub const DEFAULT_TOP_K: usize = 50;

/// A ranked source of chunk IDs for a query.
pub trait Retriever: Send + Sync {
    /// Stable name used for weight lookup and logs.
    fn name(&self) -> &str;

    /// Best `top_k` chunks of `store` for `query`, best first.
    fn search<'a>(
        &'a self,
        store: &'a str,
        query: &'a str,
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredChunk>>>;
}

/// Sparse retriever backed by `SQLite` FTS5 `bm25()`.
#[derive(Debug, Clone)]
pub struct LexicalRetriever {
    store: SqliteStore,
}

impl LexicalRetriever {
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

impl Retriever for LexicalRetriever {
    fn name(&self) -> &str {
        "lexical"
    }

    fn search<'a>(
        &'a self,
        store: &'a str,
        query: &'a str,
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
        Box::pin(async move { Ok(self.store.search_lexical(store, query, top_k).await?) })
    }
}

/// Dense retriever: embeds the query and runs a cosine search in `Qdrant`.
pub struct DenseRetriever {
    store: Arc<QdrantStore>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for DenseRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseRetriever")
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

impl DenseRetriever {
    #[must_use]
    pub fn new(store: Arc<QdrantStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

impl Retriever for DenseRetriever {
    fn name(&self) -> &str {
        "dense"
    }

    fn search<'a>(
        &'a self,
        store: &'a str,
        query: &'a str,
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
        Box::pin(async move {
            let texts = [query.to_owned()];
            let vector = self
                .embedder
                .embed(&texts)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| sift_index::EmbedError("no vector for query".into()))?;
            Ok(self.store.search_dense(store, vector, top_k).await?)
        })
    }
}

/// A fused result joined with its stored chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub result: ScoredResult,
    /// `None` when the chunk vanished between search and fetch.
    pub chunk: Option<ChunkRecord>,
}

/// Runs every retriever concurrently and fuses their lists with weighted RRF.
pub struct HybridSearcher {
    retrievers: Vec<Arc<dyn Retriever>>,
    weights: HashMap<String, f64>,
    k: u32,
    top_k: usize,
}

impl std::fmt::Debug for HybridSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.retrievers.iter().map(|r| r.name()).collect();
        f.debug_struct("HybridSearcher")
            .field("retrievers", &names)
            .field("weights", &self.weights)
            .field("k", &self.k)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Default for HybridSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridSearcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            retrievers: Vec::new(),
            weights: HashMap::new(),
            k: DEFAULT_RRF_K,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retrievers.push(retriever);
        self
    }

    /// Per-retriever weights by name. Retrievers without an entry get
    /// `1 / retrievers`.
    #[must_use]
    pub fn with_weights(mut self, weights: HashMap<String, f64>) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn retriever_names(&self) -> Vec<&str> {
        self.retrievers.iter().map(|r| r.name()).collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn resolved_weights(&self) -> Vec<f64> {
        let equal = 1.0 / self.retrievers.len().max(1) as f64;
        self.retrievers
            .iter()
            .map(|r| self.weights.get(r.name()).copied().unwrap_or(equal))
            .collect()
    }

    /// Fused results for `query`, at most `limit` long.
    ///
    /// A failing retriever contributes an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NoRetrievers`] with nothing configured and
    /// [`SearchError::AllRetrieversFailed`] when every retriever errors.
    pub async fn search(&self, store: &str, query: &str, limit: usize) -> Result<Vec<ScoredResult>> {
        if self.retrievers.is_empty() {
            return Err(SearchError::NoRetrievers);
        }
        let top_k = self.top_k.max(limit);
        let outcomes = join_all(
            self.retrievers
                .iter()
                .map(|r| r.search(store, query, top_k)),
        )
        .await;

        let mut lists = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for (retriever, outcome) in self.retrievers.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => {
                    tracing::debug!(retriever = retriever.name(), hits = hits.len(), "retrieved");
                    lists.push(hits);
                }
                Err(e) => {
                    tracing::warn!(retriever = retriever.name(), error = %e, "retriever failed");
                    errors.push(format!("{}: {e}", retriever.name()));
                    lists.push(Vec::new());
                }
            }
        }
        if errors.len() == self.retrievers.len() {
            return Err(SearchError::AllRetrieversFailed(errors.join("; ")));
        }

        let mut fused = fuse(&lists, &self.resolved_weights(), self.k);
        fused.truncate(limit);
        tracing::info!(store, results = fused.len(), "search complete");
        Ok(fused)
    }

    /// [`HybridSearcher::search`] followed by fetching each chunk from `documents`.
    ///
    /// # Errors
    ///
    /// Same as [`HybridSearcher::search`], plus store errors from the fetch.
    pub async fn search_chunks(
        &self,
        documents: &dyn DocumentStore,
        store: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let results = self.search(store, query, limit).await?;
        let ids = results.iter().map(|r| r.chunk_id.clone()).collect();
        let mut chunks: HashMap<String, ChunkRecord> = documents
            .fetch_chunks(store, ids)
            .await?
            .into_iter()
            .map(|c| (c.chunk_id.clone(), c))
            .collect();
        Ok(results
            .into_iter()
            .map(|result| {
                let chunk = chunks.remove(&result.chunk_id);
                SearchHit { result, chunk }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_store::StoreError;

    struct Fixed {
        name: &'static str,
        ids: Vec<&'static str>,
        fail: bool,
    }

    impl Retriever for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn search<'a>(
            &'a self,
            _store: &'a str,
            _query: &'a str,
            top_k: usize,
        ) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
            Box::pin(async move {
                if self.fail {
                    return Err(StoreError::Other(format!("{} down", self.name)).into());
                }
                Ok(self
                    .ids
                    .iter()
                    .take(top_k)
                    .map(|id| ScoredChunk {
                        chunk_id: (*id).to_string(),
                        score: 1.0,
                    })
                    .collect())
            })
        }
    }

    fn fixed(name: &'static str, ids: &[&'static str], fail: bool) -> Arc<dyn Retriever> {
        Arc::new(Fixed {
            name,
            ids: ids.to_vec(),
            fail,
        })
    }

    fn chunk_ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn fuses_all_retrievers() {
        let searcher = HybridSearcher::new()
            .with_retriever(fixed("lexical", &["a", "b", "c"], false))
            .with_retriever(fixed("dense", &["b", "a"], false));
        let out = searcher.search("s", "q", 10).await.unwrap();
        assert_eq!(chunk_ids(&out), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let searcher = HybridSearcher::new().with_retriever(fixed("lexical", &["a", "b", "c"], false));
        let out = searcher.search("s", "q", 2).await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn failing_retriever_contributes_nothing() {
        let searcher = HybridSearcher::new()
            .with_retriever(fixed("lexical", &["a"], true))
            .with_retriever(fixed("dense", &["b"], false));
        let out = searcher.search("s", "q", 10).await.unwrap();
        assert_eq!(chunk_ids(&out), vec!["b"]);
        assert_eq!(out[0].ranks, vec![0, 1]);
    }

    #[tokio::test]
    async fn all_failing_is_error() {
        let searcher = HybridSearcher::new()
            .with_retriever(fixed("lexical", &["a"], true))
            .with_retriever(fixed("dense", &["b"], true));
        let err = searcher.search("s", "q", 10).await.unwrap_err();
        assert!(matches!(err, SearchError::AllRetrieversFailed(ref m) if m.contains("dense down")));
    }

    #[tokio::test]
    async fn no_retrievers_is_error() {
        let err = HybridSearcher::new().search("s", "q", 10).await.unwrap_err();
        assert!(matches!(err, SearchError::NoRetrievers));
    }

    #[tokio::test]
    async fn named_weights_apply() {
        let weights = HashMap::from([("dense".to_string(), 0.9), ("lexical".to_string(), 0.1)]);
        let searcher = HybridSearcher::new()
            .with_retriever(fixed("lexical", &["lex", "den"], false))
            .with_retriever(fixed("dense", &["den", "lex"], false))
            .with_weights(weights);
        let out = searcher.search("s", "q", 10).await.unwrap();
        assert_eq!(out[0].chunk_id, "den");
    }

    #[test]
    fn unnamed_retrievers_get_equal_weight() {
        let searcher = HybridSearcher::new()
            .with_retriever(fixed("a", &[], false))
            .with_retriever(fixed("b", &[], false))
            .with_weights(HashMap::from([("a".to_string(), 0.8)]));
        assert_eq!(searcher.resolved_weights(), vec![0.8, 0.5]);
        assert_eq!(searcher.retriever_names(), vec!["a", "b"]);
    }
}
