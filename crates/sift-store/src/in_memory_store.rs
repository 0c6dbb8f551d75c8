use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use crate::document_store::{BoxFuture, DocumentStore};
use crate::error::{Result, StoreError};
use crate::types::{ChunkRecord, DocumentRecord, RemovedDocuments, StoreStats};

#[derive(Default)]
struct MemoryCollection {
    documents: BTreeMap<String, DocumentRecord>,
    chunks: BTreeMap<String, ChunkRecord>,
    by_document: HashMap<String, BTreeSet<String>>,
    by_path: HashMap<String, BTreeSet<String>>,
}

fn unlink(index: &mut HashMap<String, BTreeSet<String>>, key: &str, chunk_id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(chunk_id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl MemoryCollection {
    fn with_chunk_ids(&self, doc: &DocumentRecord) -> DocumentRecord {
        let mut doc = doc.clone();
        doc.chunk_ids = self
            .by_document
            .get(&doc.document_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        doc
    }

    fn insert_chunk(&mut self, chunk: ChunkRecord) {
        let id = chunk.chunk_id.clone();
        self.by_document
            .entry(chunk.document_id.clone())
            .or_default()
            .insert(id.clone());
        self.by_path
            .entry(chunk.path.clone())
            .or_default()
            .insert(id.clone());
        if let Some(previous) = self.chunks.insert(id, chunk) {
            self.unlink_moved(&previous);
        }
    }

    /// Drop index entries of a replaced chunk that now points elsewhere.
    fn unlink_moved(&mut self, previous: &ChunkRecord) {
        let Some(current) = self.chunks.get(&previous.chunk_id) else {
            return;
        };
        if current.document_id != previous.document_id {
            unlink(&mut self.by_document, &previous.document_id, &previous.chunk_id);
        }
        if current.path != previous.path {
            unlink(&mut self.by_path, &previous.path, &previous.chunk_id);
        }
    }

    fn remove_chunk(&mut self, chunk_id: &str) -> bool {
        let Some(chunk) = self.chunks.remove(chunk_id) else {
            return false;
        };
        unlink(&mut self.by_document, &chunk.document_id, chunk_id);
        unlink(&mut self.by_path, &chunk.path, chunk_id);
        true
    }

    fn remove_document(&mut self, path: &str, removed: &mut RemovedDocuments) {
        if self.documents.remove(path).is_none() {
            return;
        }
        let ids: Vec<String> = self
            .by_path
            .get(path)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        for id in &ids {
            self.remove_chunk(id);
        }
        removed.paths.push(path.to_owned());
        removed.chunk_ids.extend(ids);
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.chunks.clear();
        self.by_document.clear();
        self.by_path.clear();
    }
}

/// Process-local backend; contents vanish with the process.
pub struct InMemoryStore {
    stores: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

impl DocumentStore for InMemoryStore {
    fn create_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            stores.entry(store).or_default();
            Ok(())
        })
    }

    fn store_exists(&self, store: &str) -> BoxFuture<'_, Result<bool>> {
        let store = store.to_owned();
        Box::pin(async move {
            let stores = self.stores.read().map_err(poisoned)?;
            Ok(stores.contains_key(&store))
        })
    }

    fn list_stores(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let stores = self.stores.read().map_err(poisoned)?;
            let mut names: Vec<String> = stores.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    fn delete_store(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            stores.remove(&store);
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
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            let mut document = document;
            document.chunk_ids.clear();
            col.documents.insert(document.path.clone(), document);
            Ok(())
        })
    }

    fn upsert_chunks(&self, store: &str, chunks: Vec<ChunkRecord>) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            for chunk in chunks {
                col.insert_chunk(chunk);
            }
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
            let stores = self.stores.read().map_err(poisoned)?;
            let col = stores.get(&store).ok_or(StoreError::StoreNotFound(store))?;
            Ok(col.documents.get(&path).map(|d| col.with_chunk_ids(d)))
        })
    }

    fn list_documents(&self, store: &str) -> BoxFuture<'_, Result<Vec<DocumentRecord>>> {
        let store = store.to_owned();
        Box::pin(async move {
            let stores = self.stores.read().map_err(poisoned)?;
            let col = stores.get(&store).ok_or(StoreError::StoreNotFound(store))?;
            Ok(col
                .documents
                .values()
                .map(|d| col.with_chunk_ids(d))
                .collect())
        })
    }

    fn fetch_chunks(
        &self,
        store: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>>> {
        let store = store.to_owned();
        Box::pin(async move {
            let stores = self.stores.read().map_err(poisoned)?;
            let col = stores.get(&store).ok_or(StoreError::StoreNotFound(store))?;
            Ok(ids
                .iter()
                .filter_map(|id| col.chunks.get(id).cloned())
                .collect())
        })
    }

    fn delete_chunks(&self, store: &str, ids: Vec<String>) -> BoxFuture<'_, Result<usize>> {
        let store = store.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(0);
            }
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            Ok(ids
                .iter()
                .filter(|id| col.remove_chunk(id))
                .count())
        })
    }

    fn delete_documents(
        &self,
        store: &str,
        paths: Vec<String>,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            let mut removed = RemovedDocuments::default();
            for path in &paths {
                col.remove_document(path, &mut removed);
            }
            Ok(removed)
        })
    }

    fn delete_by_path_prefix(
        &self,
        store: &str,
        prefix: &str,
    ) -> BoxFuture<'_, Result<RemovedDocuments>> {
        let store = store.to_owned();
        let prefix = prefix.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            let matching: Vec<String> = col
                .documents
                .keys()
                .filter(|p| p.starts_with(&prefix))
                .cloned()
                .collect();
            let mut removed = RemovedDocuments::default();
            for path in &matching {
                col.remove_document(path, &mut removed);
            }
            Ok(removed)
        })
    }

    fn clear(&self, store: &str) -> BoxFuture<'_, Result<()>> {
        let store = store.to_owned();
        Box::pin(async move {
            let mut stores = self.stores.write().map_err(poisoned)?;
            let col = stores
                .get_mut(&store)
                .ok_or(StoreError::StoreNotFound(store))?;
            col.clear();
            Ok(())
        })
    }

    fn stats(&self, store: &str) -> BoxFuture<'_, Result<StoreStats>> {
        let store = store.to_owned();
        Box::pin(async move {
            let stores = self.stores.read().map_err(poisoned)?;
            let col = stores
                .get(&store)
                .ok_or_else(|| StoreError::StoreNotFound(store.clone()))?;
            Ok(StoreStats {
                documents: col.documents.len(),
                chunks: col.chunks.len(),
                last_indexed_at: col.documents.values().map(|d| d.indexed_at).max(),
                store,
            })
        })
    }
}
