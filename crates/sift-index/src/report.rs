//! Per-operation reports returned by [`IndexManager`](crate::IndexManager).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Indexed,
    Skipped,
    Failed,
}

/// What happened to one file of an index batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: String,
    /// Empty when the file failed before its identity was computed.
    pub document_id: String,
    pub status: FileStatus,
    pub chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub store: String,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Chunks written by files with status `Indexed`.
    pub chunks_total: usize,
    pub duration_ms: u64,
    pub files: Vec<FileOutcome>,
}

impl IndexReport {
    pub(crate) fn new(store: &str) -> Self {
        Self {
            store: store.to_owned(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Indexed => {
                self.indexed += 1;
                self.chunks_total += outcome.chunks;
            }
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Failed => self.failed += 1,
        }
        self.files.push(outcome);
    }

    /// Record a file that failed before or during indexing.
    pub fn record_failure(&mut self, path: impl Into<String>, error: &dyn std::fmt::Display) {
        self.record(FileOutcome {
            path: path.into(),
            document_id: String::new(),
            status: FileStatus::Failed,
            chunks: 0,
            error: Some(error.to_string()),
        });
    }

    /// Paths whose status is `Failed`.
    #[must_use]
    pub fn failed_paths(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
            .map(|f| f.path.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub documents_removed: usize,
    pub chunks_removed: usize,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub removed: Vec<String>,
    pub chunks_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(path: &str, status: FileStatus, chunks: usize) -> FileOutcome {
        FileOutcome {
            path: path.into(),
            document_id: String::new(),
            status,
            chunks,
            error: None,
        }
    }

    #[test]
    fn record_updates_counters() {
        let mut report = IndexReport::new("s");
        report.record(outcome("a", FileStatus::Indexed, 3));
        report.record(outcome("b", FileStatus::Skipped, 2));
        report.record(outcome("c", FileStatus::Failed, 0));
        assert_eq!((report.indexed, report.skipped, report.failed), (1, 1, 1));
        assert_eq!(report.chunks_total, 3);
        assert_eq!(report.failed_paths(), vec!["c"]);

        report.record_failure("d", &"permission denied");
        assert_eq!(report.failed, 2);
        assert_eq!(report.files[3].error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&outcome("a", FileStatus::Skipped, 0)).unwrap();
        assert!(json.contains("\"status\":\"skipped\""));
        assert!(!json.contains("error"));
    }
}
