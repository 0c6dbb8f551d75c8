use super::SqliteStore;
use crate::error::Result;
use crate::types::ScoredChunk;

/// Column weights for `bm25()`: path, symbols, content.
const BM25_WEIGHTS: (f64, f64, f64) = (1.0, 4.0, 1.0);

/// Turn free text into an FTS5 `MATCH` expression.
///
/// Each word becomes a quoted phrase and the phrases are OR-ed, so user
/// input can never inject FTS5 operators. Returns `None` when the query
/// has no searchable terms.
#[must_use]
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl SqliteStore {
    /// BM25 keyword search over chunk path, symbols and content.
    ///
    /// Scores are negated `bm25()` values so that larger means better.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is missing or the query fails.
    pub async fn search_lexical(
        &self,
        store: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.ensure_store(store).await?;
        let Some(expr) = fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (w_path, w_symbols, w_content) = BM25_WEIGHTS;
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT c.chunk_id, bm25(chunks_fts, ?, ?, ?) AS rank \
             FROM chunks_fts JOIN chunks c ON c.rowid = chunks_fts.rowid \
             WHERE chunks_fts MATCH ? AND c.store = ? \
             ORDER BY rank, c.chunk_id \
             LIMIT ?",
        )
        .bind(w_path)
        .bind(w_symbols)
        .bind(w_content)
        .bind(&expr)
        .bind(store)
        .bind(i64::try_from(limit)?)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(store, hits = rows.len(), "lexical search");

        #[allow(clippy::cast_possible_truncation)]
        Ok(rows
            .into_iter()
            .map(|(chunk_id, rank)| ScoredChunk {
                chunk_id,
                score: (-rank) as f32,
            })
            .collect())
    }
}
