use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 10] = [
    "SIFT_STORE_BACKEND",
    "SIFT_SQLITE_PATH",
    "SIFT_QDRANT_URL",
    "SIFT_DEFAULT_STORE",
    "SIFT_INDEX_MAX_LINES",
    "SIFT_INDEX_WINDOW_OVERLAP",
    "SIFT_INDEX_MAX_FILE_SIZE",
    "SIFT_SEARCH_RRF_K",
    "SIFT_SEARCH_LIMIT",
    "SIFT_SEARCH_TOP_K",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("sift.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.store.backend, BackendKind::Sqlite);
    assert_eq!(config.store.sqlite_path, ".sift/index.db");
    assert_eq!(config.store.qdrant_url, "http://localhost:6334");
    assert_eq!(config.store.default_store, "default");
    assert_eq!(config.index.max_lines, 60);
    assert_eq!(config.index.window_overlap, 0);
    assert_eq!(config.index.max_file_size, 10 * 1024 * 1024);
    assert_eq!(config.index.max_path_length, 1024);
    assert!(config.index.chunkable_kinds.is_empty());
    assert_eq!(config.index.embedding_dim, 256);
    assert_eq!(config.search.rrf_k, 60);
    assert_eq!(config.search.limit, 10);
    assert_eq!(config.search.top_k, 50);
    assert!(config.search.weights.is_empty());
    config.validate().unwrap();
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(std::path::Path::new("/nonexistent/sift.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[store]
backend = "memory"
default_store = "work"

[index]
max_lines = 40
window_overlap = 5

[index.chunkable_kinds]
go = ["function_declaration"]

[search]
rrf_k = 30
limit = 5

[search.weights]
lexical = 0.7
dense = 0.3
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.store.backend, BackendKind::Memory);
    assert_eq!(config.store.default_store, "work");
    assert_eq!(config.store.sqlite_path, ".sift/index.db");
    assert_eq!((config.index.max_lines, config.index.window_overlap), (40, 5));
    assert_eq!(
        config.index.chunkable_kinds["go"],
        vec!["function_declaration".to_string()]
    );
    assert_eq!(config.search.rrf_k, 30);
    assert_eq!(config.search.weights["lexical"], 0.7);
    assert_eq!(config.search.top_k, 50);
    config.validate().unwrap();
}

#[test]
#[serial]
fn invalid_toml_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[store\nbackend = ");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[search]\nlimit = 3\n");
    clear_env();
    unsafe {
        std::env::set_var("SIFT_STORE_BACKEND", "qdrant");
        std::env::set_var("SIFT_QDRANT_URL", "http://qdrant:6334");
        std::env::set_var("SIFT_SEARCH_LIMIT", "25");
        std::env::set_var("SIFT_INDEX_MAX_LINES", "80");
    }

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.store.backend, BackendKind::Qdrant);
    assert_eq!(config.store.qdrant_url, "http://qdrant:6334");
    assert_eq!(config.search.limit, 25);
    assert_eq!(config.index.max_lines, 80);
}

#[test]
#[serial]
fn invalid_env_values_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("SIFT_STORE_BACKEND", "postgres");
        std::env::set_var("SIFT_SEARCH_RRF_K", "sixty");
        std::env::set_var("SIFT_SEARCH_TOP_K", "-1");
    }

    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.store.backend, BackendKind::Sqlite);
    assert_eq!(config.search.rrf_k, 60);
    assert_eq!(config.search.top_k, 50);
}

#[test]
fn validate_rejects_zero_max_lines() {
    let mut config = Config::default();
    config.index.max_lines = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_overlap_not_below_window() {
    let mut config = Config::default();
    config.index.window_overlap = 60;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("window_overlap"));
}

#[test]
fn validate_rejects_bad_weights() {
    for bad in [-0.1, f64::NAN, f64::INFINITY] {
        let mut config = Config::default();
        config.search.weights.insert("dense".into(), bad);
        assert!(config.validate().is_err(), "accepted {bad}");
    }
}

#[test]
fn validate_rejects_zero_k_and_blank_store() {
    let mut config = Config::default();
    config.search.rrf_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.store.default_store = "  ".into();
    assert!(config.validate().is_err());
}

#[test]
fn backend_kind_display() {
    assert_eq!(BackendKind::Qdrant.to_string(), "qdrant");
    assert_eq!(BackendKind::default().as_str(), "sqlite");
}
