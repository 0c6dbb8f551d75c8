//! Contextualized embedding text: a `#`-prefixed header naming the path,
//! language, syntax kind and declared names, followed by the chunk body.

use crate::chunker::Chunk;

/// Maximum number of symbols listed in the embedding header.
const MAX_HEADER_SYMBOLS: usize = 12;

/// Generate text optimized for embedding (not for display).
#[must_use]
pub fn contextualize_for_embedding(path: &str, chunk: &Chunk) -> String {
    let mut text = String::with_capacity(chunk.content.len() + 128);

    text.push_str("# ");
    text.push_str(path);
    text.push('\n');

    text.push_str("# Language: ");
    text.push_str(chunk.language.id());
    text.push('\n');

    if !chunk.node_type.is_empty() {
        text.push_str("# Kind: ");
        text.push_str(&chunk.node_type);
        text.push('\n');
    }

    if !chunk.symbols.is_empty() {
        let shown: Vec<&str> = chunk
            .symbols
            .iter()
            .take(MAX_HEADER_SYMBOLS)
            .map(String::as_str)
            .collect();
        text.push_str("# Symbols: ");
        text.push_str(&shown.join(", "));
        text.push('\n');
    }

    text.push_str(&chunk.content);
    text
}
