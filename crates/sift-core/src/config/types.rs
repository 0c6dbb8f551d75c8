use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Memory,
    Qdrant,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
            Self::Qdrant => "qdrant",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_store_name")]
    pub default_store: String,
}

fn default_sqlite_path() -> String {
    ".sift/index.db".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_store_name() -> String {
    "default".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sqlite_path: default_sqlite_path(),
            qdrant_url: default_qdrant_url(),
            default_store: default_store_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default)]
    pub window_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,
    /// Language id → node kinds, replacing the built-in set for that language.
    #[serde(default)]
    pub chunkable_kinds: HashMap<String, Vec<String>>,
    /// Vector size of the built-in hashing embedder used by the `qdrant` backend.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_max_lines() -> usize {
    sift_index::window::DEFAULT_MAX_LINES
}

fn default_max_file_size() -> usize {
    sift_index::lifecycle::DEFAULT_MAX_FILE_SIZE
}

fn default_max_path_length() -> usize {
    sift_index::lifecycle::DEFAULT_MAX_PATH_LENGTH
}

fn default_embedding_dim() -> usize {
    sift_index::embed::DEFAULT_HASHING_DIM
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            window_overlap: 0,
            max_file_size: default_max_file_size(),
            max_path_length: default_max_path_length(),
            chunkable_kinds: HashMap::new(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    /// Retriever name → fusion weight. Empty means equal weighting.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_rrf_k() -> u32 {
    sift_search::DEFAULT_RRF_K
}

fn default_limit() -> usize {
    10
}

fn default_top_k() -> usize {
    sift_search::DEFAULT_TOP_K
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            weights: HashMap::new(),
            limit: default_limit(),
            top_k: default_top_k(),
        }
    }
}
