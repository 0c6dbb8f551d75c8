//! Deterministic identifiers for documents and chunks.

/// Length in hex characters of chunk and document identifiers.
pub const ID_LEN: usize = 16;

/// blake3 of the raw file bytes, full hex.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

fn short_id(hasher: &blake3::Hasher) -> String {
    let hex = hasher.finalize().to_hex();
    hex[..ID_LEN].to_owned()
}

/// Identity of a chunk: a pure function of its path and line span.
#[must_use]
pub fn chunk_id(path: &str, start_line: usize, end_line: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"chunk\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(&(start_line as u64).to_le_bytes());
    hasher.update(&(end_line as u64).to_le_bytes());
    short_id(&hasher)
}

/// Identity of a document version: a pure function of path and content hash.
#[must_use]
pub fn document_id(path: &str, content_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"document\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(content_hash.as_bytes());
    short_id(&hasher)
}
