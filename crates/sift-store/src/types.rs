use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Indexed identity of one source file version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub path: String,
    pub content_hash: String,
    pub language: String,
    /// Unix seconds of the write that produced this version.
    pub indexed_at: i64,
    /// Chunk IDs currently owned by this document, sorted ascending.
    ///
    /// Populated by the store on read; ignored on upsert.
    #[serde(default)]
    pub chunk_ids: Vec<String>,
}

/// The unit persisted per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub path: String,
    pub language: String,
    pub node_type: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Read-only counters for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub store: String,
    pub documents: usize,
    pub chunks: usize,
    pub last_indexed_at: Option<i64>,
}

/// What a document deletion actually removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedDocuments {
    pub paths: Vec<String>,
    pub chunk_ids: Vec<String>,
}

impl RemovedDocuments {
    pub fn merge(&mut self, other: Self) {
        for path in other.paths {
            if !self.paths.contains(&path) {
                self.paths.push(path);
            }
        }
        for id in other.chunk_ids {
            if !self.chunk_ids.contains(&id) {
                self.chunk_ids.push(id);
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.chunk_ids.is_empty()
    }
}

/// A chunk ID with a backend-native relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub score: f32,
}

/// Current wall-clock time as Unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
