use super::SqliteStore;
use crate::document_store::{BoxFuture, DocumentStore};
use crate::error::Result;
use crate::types::{ChunkRecord, DocumentRecord, RemovedDocuments, StoreStats};

type ChunkRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    String,
);

fn chunk_from_row(row: ChunkRow) -> Result<ChunkRecord> {
    let (chunk_id, document_id, path, language, node_type, start, end, content, symbols) = row;
    Ok(ChunkRecord {
        chunk_id,
        document_id,
        path,
        language,
        node_type,
        start_line: usize::try_from(start)?,
        end_line: usize::try_from(end)?,
        content,
        symbols: serde_json::from_str(&symbols)?,
        vector: None,
    })
}

impl SqliteStore {
    async fn chunk_ids_for_document(&self, store: &str, document_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT chunk_id FROM chunks WHERE store = ? AND document_id = ? ORDER BY chunk_id",
        )
        .bind(store)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn document_with_chunks(
        &self,
        store: &str,
        row: (String, String, String, String, i64),
    ) -> Result<DocumentRecord> {
        let (path, document_id, content_hash, language, indexed_at) = row;
        let chunk_ids = self.chunk_ids_for_document(store, &document_id).await?;
        Ok(DocumentRecord {
            document_id,
            path,
            content_hash,
            language,
            indexed_at,
            chunk_ids,
        })
    }

    /// Paths and chunk IDs that a deletion of `paths` would remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn collect_removals(&self, store: &str, paths: &[String]) -> Result<RemovedDocuments> {
        let mut removed = RemovedDocuments::default();
        for path in paths {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT path FROM documents WHERE store = ? AND path = ?")
                    .bind(store)
                    .bind(path)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                continue;
            }
            let ids: Vec<(String,)> = sqlx::query_as(
                "SELECT chunk_id FROM chunks WHERE store = ? AND path = ? ORDER BY chunk_id",
            )
            .bind(store)
            .bind(path)
            .fetch_all(&self.pool)
            .await?;
            removed.paths.push(path.clone());
            removed.chunk_ids.extend(ids.into_iter().map(|(id,)| id));
        }
        Ok(removed)
    }

    /// Document paths starting with `prefix`, ordered.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn paths_with_prefix(&self, store: &str, prefix: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT path FROM documents WHERE store = ? AND substr(path, 1, length(?)) = ? \
             ORDER BY path",
        )
        .bind(store)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    async fn delete_paths(&self, store: &str, paths: Vec<String>) -> Result<RemovedDocuments> {
        self.ensure_store(store).await?;
        let removed = self.collect_removals(store, &paths).await?;
        if removed.paths.is_empty() {
            return Ok(removed);
        }

        let mut tx = self.pool.begin().await?;
        for path in &removed.paths {
            sqlx::query("DELETE FROM chunks WHERE store = ? AND path = ?")
                .bind(store)
                .bind(path)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM documents WHERE store = ? AND path = ?")
                .bind(store)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }
}

impl DocumentStore for SqliteStore {
    fn create_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            sqlx::query("INSERT OR IGNORE INTO stores (name) VALUES (?)")
                .bind(&store)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn store_exists(&self, store: &str) -> BoxFuture<'_, Result<bool>> {
        let store = store.to_owned();
        Box::pin(async move {
            match self.ensure_store(&store).await {
                Ok(()) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    fn list_stores(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM stores ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(|(n,)| n).collect())
        })
    }

    fn delete_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM chunks WHERE store = ?")
                .bind(&store)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM documents WHERE store = ?")
                .bind(&store)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM stores WHERE name = ?")
                .bind(&store)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn upsert_document(
        &self,
        store: &str,
        document: DocumentRecord,
    ) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            sqlx::query(
                "INSERT INTO documents \
                 (store, path, document_id, content_hash, language, indexed_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(store, path) DO UPDATE SET \
                 document_id = excluded.document_id, \
                 content_hash = excluded.content_hash, \
                 language = excluded.language, \
                 indexed_at = excluded.indexed_at",
            )
            .bind(&store)
            .bind(&document.path)
            .bind(&document.document_id)
            .bind(&document.content_hash)
            .bind(&document.language)
            .bind(document.indexed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn upsert_chunks(&self, store: &str, chunks: Vec<ChunkRecord>) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let mut tx = self.pool.begin().await?;
            for chunk in &chunks {
                let symbols = serde_json::to_string(&chunk.symbols)?;
                sqlx::query(
                    "INSERT INTO chunks \
                     (store, chunk_id, document_id, path, language, node_type, \
                      start_line, end_line, content, symbols) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT(store, chunk_id) DO UPDATE SET \
                     document_id = excluded.document_id, \
                     path = excluded.path, \
                     language = excluded.language, \
                     node_type = excluded.node_type, \
                     start_line = excluded.start_line, \
                     end_line = excluded.end_line, \
                     content = excluded.content, \
                     symbols = excluded.symbols",
                )
                .bind(&store)
                .bind(&chunk.chunk_id)
                .bind(&chunk.document_id)
                .bind(&chunk.path)
                .bind(&chunk.language)
                .bind(&chunk.node_type)
                .bind(i64::try_from(chunk.start_line)?)
                .bind(i64::try_from(chunk.end_line)?)
                .bind(&chunk.content)
                .bind(symbols)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn get_document(
        &self,
        store: &str,
        path: &str,
    ) -> BoxFuture<'_, Result<Option<DocumentRecord>>> {
        let store = store.to_owned();
        let path = path.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let row: Option<(String, String, String, String, i64)> = sqlx::query_as(
                "SELECT path, document_id, content_hash, language, indexed_at \
                 FROM documents WHERE store = ? AND path = ?",
            )
            .bind(&store)
            .bind(&path)
            .fetch_optional(&self.pool)
            .await?;
            match row {
                Some(row) => Ok(Some(self.document_with_chunks(&store, row).await?)),
                None => Ok(None),
            }
        })
    }

    fn list_documents(&self, store: &str) -> BoxFuture<'_, Result<Vec<DocumentRecord>>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
                "SELECT path, document_id, content_hash, language, indexed_at \
                 FROM documents WHERE store = ? ORDER BY path",
            )
            .bind(&store)
            .fetch_all(&self.pool)
            .await?;
            let mut docs = Vec::with_capacity(rows.len());
            for row in rows {
                docs.push(self.document_with_chunks(&store, row).await?);
            }
            Ok(docs)
        })
    }

    fn fetch_chunks(
        &self,
        store: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let mut chunks = Vec::with_capacity(ids.len());
            for id in &ids {
                let row: Option<ChunkRow> = sqlx::query_as(
                    "SELECT chunk_id, document_id, path, language, node_type, \
                     start_line, end_line, content, symbols \
                     FROM chunks WHERE store = ? AND chunk_id = ?",
                )
                .bind(&store)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                if let Some(row) = row {
                    chunks.push(chunk_from_row(row)?);
                }
            }
            Ok(chunks)
        })
    }

    fn delete_chunks(&self, store: &str, ids: Vec<String>) -> BoxFuture<'_, Result<usize>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            if ids.is_empty() {
                return Ok(0);
            }
            let mut tx = self.pool.begin().await?;
            let mut removed = 0u64;
            for id in &ids {
                let res = sqlx::query("DELETE FROM chunks WHERE store = ? AND chunk_id = ?")
                    .bind(&store)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                removed += res.rows_affected();
            }
            tx.commit().await?;
            Ok(usize::try_from(removed)?)
        })
    }

    fn delete_documents(
        &self,
        store: &str,
        paths: Vec<String>,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        Box::pin(async move { self.delete_paths(&store, paths).await })
    }

    fn delete_by_path_prefix(
        &self,
        store: &str,
        prefix: &str,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        let prefix = prefix.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let paths = self.paths_with_prefix(&store, &prefix).await?;
            self.delete_paths(&store, paths).await
        })
    }

    fn clear(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM chunks WHERE store = ?")
                .bind(&store)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM documents WHERE store = ?")
                .bind(&store)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn stats(&self, store: &str) -> BoxFuture<'_, Result<StoreStats>> {
        let store = store.to_owned();
        Box::pin(async move {
            self.ensure_store(&store).await?;
            let (documents, last_indexed_at): (i64, Option<i64>) = sqlx::query_as(
                "SELECT COUNT(*), MAX(indexed_at) FROM documents WHERE store = ?",
            )
            .bind(&store)
            .fetch_one(&self.pool)
            .await?;
            let (chunks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE store = ?")
                .bind(&store)
                .fetch_one(&self.pool)
                .await?;
            Ok(StoreStats {
                store,
                documents: usize::try_from(documents)?,
                chunks: usize::try_from(chunks)?,
                last_indexed_at,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        let store = SqliteStore::new(":memory:").await.unwrap();
        store.create_store("s").await.unwrap();
        store
    }

    fn doc(path: &str, id: &str, at: i64) -> DocumentRecord {
        DocumentRecord {
            document_id: id.into(),
            path: path.into(),
            content_hash: format!("h{id}"),
            language: "rust".into(),
            indexed_at: at,
            chunk_ids: vec![],
        }
    }

    fn chunk(id: &str, doc_id: &str, path: &str, content: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.into(),
            document_id: doc_id.into(),
            path: path.into(),
            language: "rust".into(),
            node_type: "function_item".into(),
            start_line: 3,
            end_line: 9,
            content: content.into(),
            symbols: vec!["alpha".into()],
            vector: None,
        }
    }

    #[tokio::test]
    async fn create_and_list_stores() {
        let store = test_store().await;
        store.create_store("b").await.unwrap();
        store.create_store("s").await.unwrap();
        assert_eq!(store.list_stores().await.unwrap(), vec!["b", "s"]);
        assert!(store.store_exists("b").await.unwrap());
        assert!(!store.store_exists("zzz").await.unwrap());
    }

    #[tokio::test]
    async fn document_roundtrip_with_chunks() {
        let store = test_store().await;
        store
            .upsert_chunks(
                "s",
                vec![
                    chunk("c2", "d1", "a.rs", "fn two() {}"),
                    chunk("c1", "d1", "a.rs", "fn one() {}"),
                ],
            )
            .await
            .unwrap();
        store.upsert_document("s", doc("a.rs", "d1", 7)).await.unwrap();

        let got = store.get_document("s", "a.rs").await.unwrap().unwrap();
        assert_eq!(got.document_id, "d1");
        assert_eq!(got.chunk_ids, vec!["c1", "c2"]);

        let chunks = store.fetch_chunks("s", vec!["c2".into()]).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 3);
        assert_eq!(chunks[0].symbols, vec!["alpha"]);
    }

    #[tokio::test]
    async fn upsert_document_replaces_by_path() {
        let store = test_store().await;
        store.upsert_document("s", doc("a.rs", "d1", 1)).await.unwrap();
        store.upsert_document("s", doc("a.rs", "d2", 2)).await.unwrap();
        let docs = store.list_documents("s").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, "d2");
    }

    #[tokio::test]
    async fn prefix_delete_does_not_treat_wildcards() {
        let store = test_store().await;
        for (path, id) in [("src_a/x.rs", "d1"), ("src%/y.rs", "d2"), ("src/z.rs", "d3")] {
            store.upsert_document("s", doc(path, id, 1)).await.unwrap();
            store
                .upsert_chunks("s", vec![chunk(&format!("c{id}"), id, path, "x")])
                .await
                .unwrap();
        }
        let removed = store.delete_by_path_prefix("s", "src%").await.unwrap();
        assert_eq!(removed.paths, vec!["src%/y.rs"]);
        assert_eq!(removed.chunk_ids, vec!["cd2"]);
        let stats = store.stats("s").await.unwrap();
        assert_eq!((stats.documents, stats.chunks), (2, 2));
    }

    #[tokio::test]
    async fn delete_documents_ignores_unknown_paths() {
        let store = test_store().await;
        let removed = store
            .delete_documents("s", vec!["nope.rs".into()])
            .await
            .unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn stats_track_last_indexed() {
        let store = test_store().await;
        store.upsert_document("s", doc("a.rs", "d1", 10)).await.unwrap();
        store.upsert_document("s", doc("b.rs", "d2", 42)).await.unwrap();
        let stats = store.stats("s").await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.last_indexed_at, Some(42));
    }

    #[tokio::test]
    async fn delete_store_drops_contents() {
        let store = test_store().await;
        store.upsert_document("s", doc("a.rs", "d1", 1)).await.unwrap();
        store.delete_store("s").await.unwrap();
        assert!(!store.store_exists("s").await.unwrap());
        store.create_store("s").await.unwrap();
        assert!(store.list_documents("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_symbols_column_is_an_error() {
        let store = test_store().await;
        store
            .upsert_chunks("s", vec![chunk("c1", "d1", "a.rs", "fn one() {}")])
            .await
            .unwrap();
        sqlx::query("UPDATE chunks SET symbols = 'not json' WHERE chunk_id = 'c1'")
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.fetch_chunks("s", vec!["c1".into()]).await.unwrap_err();
        assert!(matches!(err, crate::error::StoreError::Json(_)));
    }

    #[tokio::test]
    async fn writes_to_missing_store_fail() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let err = store
            .upsert_chunks("nope", vec![chunk("c", "d", "p", "x")])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
