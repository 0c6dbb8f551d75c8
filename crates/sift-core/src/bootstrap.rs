//! Component construction from a validated [`Config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use sift_index::{
    ChunkableKinds, Embedder, HashingEmbedder, IndexManager, IndexOptions, Lang, StructuralChunker,
    WindowConfig, default_parser,
};
use sift_search::{DenseRetriever, HybridSearcher, LexicalRetriever};
use sift_store::{DocumentStore, InMemoryStore, QdrantStore, SqliteStore};

use crate::config::{BackendKind, Config, IndexConfig, StoreConfig};

/// Priority: explicit path > `SIFT_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SIFT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// The configured store, plus typed handles for the retrievers that need them.
pub struct Backend {
    pub documents: Arc<dyn DocumentStore>,
    pub lexical: Option<SqliteStore>,
    pub dense: Option<Arc<QdrantStore>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("lexical", &self.lexical.is_some())
            .field("dense", &self.dense.is_some())
            .finish_non_exhaustive()
    }
}

async fn open_sqlite(path: &str) -> anyhow::Result<SqliteStore> {
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::new(path)
        .await
        .with_context(|| format!("failed to open sqlite database at {path}"))
}

/// Open the backend selected by `config.backend`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the `Qdrant`
/// client cannot be built.
pub async fn build_backend(config: &StoreConfig) -> anyhow::Result<Backend> {
    let backend = match config.backend {
        BackendKind::Memory => Backend {
            documents: Arc::new(InMemoryStore::new()),
            lexical: None,
            dense: None,
        },
        BackendKind::Sqlite => {
            let sqlite = open_sqlite(&config.sqlite_path).await?;
            Backend {
                documents: Arc::new(sqlite.clone()),
                lexical: Some(sqlite),
                dense: None,
            }
        }
        BackendKind::Qdrant => {
            let sqlite = open_sqlite(&config.sqlite_path).await?;
            let qdrant = Arc::new(
                QdrantStore::new(&config.qdrant_url, sqlite.clone())
                    .context("failed to build qdrant client")?,
            );
            Backend {
                documents: qdrant.clone(),
                lexical: Some(sqlite),
                dense: Some(qdrant),
            }
        }
    };
    tracing::info!(backend = %config.backend, "store backend ready");
    Ok(backend)
}

/// Built-in chunkable kinds with per-language overrides applied.
#[must_use]
pub fn chunkable_kinds(config: &IndexConfig) -> ChunkableKinds {
    let mut kinds = ChunkableKinds::default();
    for (lang, node_kinds) in &config.chunkable_kinds {
        match Lang::from_id(lang) {
            Some(lang) => kinds.set(lang, node_kinds.iter().cloned()),
            None => tracing::warn!("ignoring chunkable_kinds for unknown language: {lang}"),
        }
    }
    kinds
}

#[must_use]
pub fn index_options(config: &IndexConfig) -> IndexOptions {
    IndexOptions {
        window: WindowConfig {
            max_lines: config.max_lines,
            overlap: config.window_overlap,
        },
        max_file_size: config.max_file_size,
        max_path_length: config.max_path_length,
    }
}

/// Embedder required by the backend, if any.
///
/// Only `qdrant` stores vectors; it gets the hashing embedder sized by
/// `index.embedding_dim`.
#[must_use]
pub fn default_embedder(config: &Config) -> Option<Arc<dyn Embedder>> {
    match config.store.backend {
        BackendKind::Qdrant => Some(Arc::new(HashingEmbedder::new(config.index.embedding_dim))),
        BackendKind::Sqlite | BackendKind::Memory => None,
    }
}

/// Index manager over `backend`, with vectors when an embedder is given.
#[must_use]
pub fn build_manager(
    config: &Config,
    backend: &Backend,
    embedder: Option<Arc<dyn Embedder>>,
) -> IndexManager {
    let chunker = Arc::new(StructuralChunker::new(
        default_parser(),
        chunkable_kinds(&config.index),
    ));
    let manager = IndexManager::new(
        Arc::clone(&backend.documents),
        chunker,
        index_options(&config.index),
    );
    match embedder {
        Some(embedder) => manager.with_embedder(embedder),
        None => manager,
    }
}

/// Hybrid searcher over every retriever the backend supports.
///
/// # Errors
///
/// Returns an error if the backend offers no retriever.
pub fn build_searcher(
    config: &Config,
    backend: &Backend,
    embedder: Option<Arc<dyn Embedder>>,
) -> anyhow::Result<HybridSearcher> {
    let mut searcher = HybridSearcher::new()
        .with_k(config.search.rrf_k)
        .with_top_k(config.search.top_k)
        .with_weights(config.search.weights.clone());
    if let Some(sqlite) = &backend.lexical {
        searcher = searcher.with_retriever(Arc::new(LexicalRetriever::new(sqlite.clone())));
    }
    if let (Some(qdrant), Some(embedder)) = (&backend.dense, embedder) {
        searcher =
            searcher.with_retriever(Arc::new(DenseRetriever::new(Arc::clone(qdrant), embedder)));
    }
    if searcher.retriever_names().is_empty() {
        bail!("{} backend has no search support", config.store.backend);
    }
    Ok(searcher)
}
