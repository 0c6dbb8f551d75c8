mod documents;
mod lexical;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::{Result, StoreError};

pub use lexical::fts_query;

/// `SQLite` backend for document and chunk metadata plus FTS5 lexical search.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// Foreign keys are enabled per connection so that dropping a store
    /// cascades to its documents and chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // In-memory databases live and die with a single connection.
        let pool = if path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        }
        .connect_with(opts)
        .await?;

        Self::run_migrations(&pool).await?;
        tracing::debug!(path, "sqlite store opened");

        Ok(Self { pool })
    }

    /// Expose the underlying pool for shared access by other stores.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all migrations on the given pool.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails.
    pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        Ok(())
    }

    pub(crate) async fn ensure_store(&self, store: &str) -> Result<()> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM stores WHERE name = ?")
            .bind(store)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(_) => Ok(()),
            None => Err(StoreError::StoreNotFound(store.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let store = SqliteStore::new(path).await.expect("SqliteStore::new");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .expect("PRAGMA query");

        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn ensure_store_reports_missing() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let err = store.ensure_store("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn reopen_file_db_keeps_stores() {
        use crate::DocumentStore;

        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_owned();
        {
            let store = SqliteStore::new(&path).await.unwrap();
            store.create_store("kept").await.unwrap();
            store.pool().close().await;
        }
        let store = SqliteStore::new(&path).await.unwrap();
        assert_eq!(store.list_stores().await.unwrap(), vec!["kept"]);
    }
}
