use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SIFT_STORE_BACKEND") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.store.backend = kind;
            } else {
                tracing::warn!("ignoring invalid SIFT_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SIFT_SQLITE_PATH") {
            self.store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SIFT_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("SIFT_DEFAULT_STORE") {
            self.store.default_store = v;
        }
        if let Some(n) = parsed("SIFT_INDEX_MAX_LINES") {
            self.index.max_lines = n;
        }
        if let Some(n) = parsed("SIFT_INDEX_WINDOW_OVERLAP") {
            self.index.window_overlap = n;
        }
        if let Some(n) = parsed("SIFT_INDEX_MAX_FILE_SIZE") {
            self.index.max_file_size = n;
        }
        if let Some(k) = parsed("SIFT_SEARCH_RRF_K") {
            self.search.rrf_k = k;
        }
        if let Some(n) = parsed("SIFT_SEARCH_LIMIT") {
            self.search.limit = n;
        }
        if let Some(n) = parsed("SIFT_SEARCH_TOP_K") {
            self.search.top_k = n;
        }
    }
}
