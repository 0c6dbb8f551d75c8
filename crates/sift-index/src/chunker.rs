//! Structural chunking over a parsed syntax tree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::parser::{FallbackParser, SourceParser};
use crate::symbols::MAX_SYMBOLS_PER_CHUNK;
use crate::syntax::SyntaxNode;
use crate::window::{WindowConfig, line_windows};

/// One semantically coherent slice of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive.
    pub end_line: usize,
    pub language: Lang,
    /// Syntax kind that produced the chunk; empty for line windows.
    pub node_type: String,
    pub symbols: Vec<String>,
}

/// Per-language set of node kinds that become chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkableKinds {
    kinds: HashMap<Lang, HashSet<String>>,
}

impl Default for ChunkableKinds {
    fn default() -> Self {
        let mut kinds = Self::empty();
        kinds.set(
            Lang::Rust,
            [
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "type_item",
                "mod_item",
                "macro_definition",
            ],
        );
        kinds.set(Lang::Python, ["function_definition", "class_definition"]);
        let ecma = [
            "function_declaration",
            "class_declaration",
            "interface_declaration",
            "method_definition",
        ];
        kinds.set(Lang::JavaScript, ecma);
        kinds.set(Lang::TypeScript, ecma);
        kinds.set(
            Lang::Go,
            [
                "function_declaration",
                "method_declaration",
                "type_declaration",
            ],
        );
        kinds
    }
}

impl ChunkableKinds {
    /// A registry with no chunkable kinds for any language.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Replace the kind set for `lang`.
    pub fn set<I, S>(&mut self, lang: Lang, kinds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds
            .insert(lang, kinds.into_iter().map(Into::into).collect());
    }

    #[must_use]
    pub fn is_chunkable(&self, lang: Lang, kind: &str) -> bool {
        self.kinds.get(&lang).is_some_and(|k| k.contains(kind))
    }

    /// Sorted kinds configured for `lang`.
    #[must_use]
    pub fn kinds_for(&self, lang: Lang) -> Vec<&str> {
        let mut kinds: Vec<&str> = self
            .kinds
            .get(&lang)
            .map(|k| k.iter().map(String::as_str).collect())
            .unwrap_or_default();
        kinds.sort_unstable();
        kinds
    }
}

/// A matched node before sibling merging.
struct Span {
    start_byte: usize,
    end_byte: usize,
    start_line: usize,
    end_line: usize,
    kind: String,
    symbols: Vec<String>,
}

/// Cuts files into chunks at chunkable syntax nodes.
pub struct StructuralChunker {
    parser: Arc<dyn SourceParser>,
    fallback: FallbackParser,
    kinds: ChunkableKinds,
}

impl std::fmt::Debug for StructuralChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralChunker")
            .field("parser", &self.parser.name())
            .finish_non_exhaustive()
    }
}

impl StructuralChunker {
    #[must_use]
    pub fn new(parser: Arc<dyn SourceParser>, kinds: ChunkableKinds) -> Self {
        Self {
            parser,
            fallback: FallbackParser,
            kinds,
        }
    }

    #[must_use]
    pub fn kinds(&self) -> &ChunkableKinds {
        &self.kinds
    }

    /// Chunk `content` structurally.
    ///
    /// Matched nodes are emitted whole and never descended into. Siblings
    /// that share a source line are merged so line ranges never overlap.
    /// An empty result means no chunkable node was found and the caller
    /// should fall back to line windows.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Parse`] if the grammar fails and
    /// [`IndexError::Cancelled`] if `cancel` fires.
    pub fn chunk(&self, content: &str, lang: Lang, cancel: &CancellationToken) -> Result<Vec<Chunk>> {
        let root = if self.parser.supports_language(lang) {
            self.parser.parse(content, lang, cancel)?
        } else {
            self.fallback.parse(content, lang, cancel)?
        };

        let spans = merge_line_sharing(self.collect(&root, lang, cancel)?);

        spans
            .into_iter()
            .map(|span| {
                let text = content.get(span.start_byte..span.end_byte).ok_or_else(|| {
                    IndexError::Parse(format!(
                        "node range {}..{} outside source",
                        span.start_byte, span.end_byte
                    ))
                })?;
                Ok(Chunk {
                    content: text.to_owned(),
                    start_line: span.start_line,
                    end_line: span.end_line,
                    language: lang,
                    node_type: span.kind,
                    symbols: span.symbols,
                })
            })
            .collect()
    }

    /// Structural chunks, or line windows when the tree has no chunkable node.
    ///
    /// # Errors
    ///
    /// Same as [`StructuralChunker::chunk`].
    pub fn chunk_with_fallback(
        &self,
        content: &str,
        lang: Lang,
        window: WindowConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let chunks = self.chunk(content, lang, cancel)?;
        if !chunks.is_empty() {
            return Ok(chunks);
        }
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let windows = line_windows(content, lang, window.max_lines, window.overlap);
        tracing::debug!(
            lang = lang.id(),
            windows = windows.len(),
            "no structural chunks, using line windows"
        );
        Ok(windows)
    }

    /// Pre-order walk that stops at chunkable nodes.
    fn collect(&self, root: &SyntaxNode, lang: Lang, cancel: &CancellationToken) -> Result<Vec<Span>> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            if self.kinds.is_chunkable(lang, &node.kind) {
                out.push(Span {
                    start_byte: node.start_byte,
                    end_byte: node.end_byte,
                    start_line: node.start_line,
                    end_line: node.end_line,
                    kind: node.kind.clone(),
                    symbols: node.declared_names(MAX_SYMBOLS_PER_CHUNK),
                });
                continue;
            }
            stack.extend(node.children.iter().rev());
        }
        Ok(out)
    }
}

fn merge_line_sharing(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(prev) if span.start_line <= prev.end_line => {
                prev.end_byte = prev.end_byte.max(span.end_byte);
                prev.end_line = prev.end_line.max(span.end_line);
                for s in span.symbols {
                    if prev.symbols.len() < MAX_SYMBOLS_PER_CHUNK && !prev.symbols.contains(&s) {
                        prev.symbols.push(s);
                    }
                }
            }
            _ => merged.push(span),
        }
    }
    merged
}
