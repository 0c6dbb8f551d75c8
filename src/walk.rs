//! Turning CLI path arguments into store-relative source files.

use std::path::Path;

use anyhow::Context;
use sift_index::{SourceFile, is_indexable};

/// Store-relative form of `path`: relative to `root` when below it,
/// `/`-separated, without a leading `./`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let text = rel.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_owned()
}

/// Every file reachable from `paths`.
///
/// Directories are walked honouring `.gitignore` and skipping hidden
/// entries; only files with a recognised language are taken from a walk.
/// Files named explicitly are always taken.
///
/// # Errors
///
/// Returns an error if an argument does not exist.
pub fn discover(root: &Path, paths: &[std::path::PathBuf]) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot access {}", path.display()))?;
        if meta.is_file() {
            found.push(path.clone());
            continue;
        }
        let walked = ignore::WalkBuilder::new(path)
            .hidden(true)
            .git_ignore(true)
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()) && is_indexable(e.path()))
            .map(ignore::DirEntry::into_path);
        found.extend(walked);
    }
    found.sort();
    found.dedup();
    tracing::debug!(root = %root.display(), files = found.len(), "discovered files");
    Ok(found)
}

/// Files read from disk, plus the store-relative paths that could not be read.
#[derive(Debug, Default)]
pub struct Loaded {
    pub files: Vec<SourceFile>,
    pub unreadable: Vec<(String, std::io::Error)>,
}

/// Read `files` as raw bytes.
pub fn load(root: &Path, files: &[std::path::PathBuf]) -> Loaded {
    let mut loaded = Loaded::default();
    for path in files {
        let rel = relative_path(root, path);
        match std::fs::read(path) {
            Ok(content) => loaded.files.push(SourceFile::from_bytes(rel, content)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable file");
                loaded.unreadable.push((rel, e));
            }
        }
    }
    loaded
}

/// Whether `path` lies under one of `scopes`. An empty or `.` scope
/// covers every path.
pub fn in_scope(scopes: &[String], path: &str) -> bool {
    scopes.iter().any(|scope| {
        let scope = scope.trim_end_matches('/');
        scope.is_empty()
            || scope == "."
            || path == scope
            || path
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Whether a stored document should survive a sync over `scopes`:
/// documents outside every scope are left alone, the rest must still
/// exist as files under `root`.
pub fn still_present(root: &Path, scopes: &[String], path: &str) -> bool {
    !in_scope(scopes, path) || root.join(path).is_file()
}
