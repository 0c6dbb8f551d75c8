//! Parser abstraction: a tree-sitter backed variant and a fallback that
//! never fails.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, RwLock};

use tokio_util::sync::CancellationToken;
use tree_sitter::{Node, Parser};

use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::syntax::{SyntaxNode, line_count};

/// Kind of the single root node emitted by [`FallbackParser`].
pub const FALLBACK_ROOT_KIND: &str = "file";

/// Produces a [`SyntaxNode`] tree from source text.
pub trait SourceParser: Send + Sync {
    /// Parse `content` as `lang`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedLanguage`] when the language has no
    /// grammar, [`IndexError::Parse`] when the grammar produces no tree and
    /// [`IndexError::Cancelled`] when `cancel` fires mid-parse.
    fn parse(&self, content: &str, lang: Lang, cancel: &CancellationToken) -> Result<SyntaxNode>;

    /// Whether [`SourceParser::parse`] will attempt this language.
    fn supports_language(&self, lang: Lang) -> bool;

    fn name(&self) -> &'static str;
}

/// Treats the whole file as one opaque node with no children.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackParser;

impl SourceParser for FallbackParser {
    fn parse(&self, content: &str, _lang: Lang, cancel: &CancellationToken) -> Result<SyntaxNode> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        Ok(SyntaxNode {
            kind: FALLBACK_ROOT_KIND.to_owned(),
            name: None,
            start_byte: 0,
            end_byte: content.len(),
            start_line: 1,
            end_line: line_count(content),
            children: Vec::new(),
        })
    }

    fn supports_language(&self, _lang: Lang) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Tree-sitter backed parser with one lazily built parser per language.
///
/// A cached parser is used by one caller at a time; callers for the same
/// language queue on its mutex while other languages proceed in parallel.
#[derive(Default)]
pub struct TreeSitterParser {
    parsers: RwLock<HashMap<Lang, Arc<Mutex<Parser>>>>,
}

impl std::fmt::Debug for TreeSitterParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeSitterParser").finish_non_exhaustive()
    }
}

static SHARED_TREE_SITTER: LazyLock<Arc<TreeSitterParser>> =
    LazyLock::new(|| Arc::new(TreeSitterParser::new()));

impl TreeSitterParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance whose parser cache lives until exit.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_TREE_SITTER)
    }

    /// Number of languages with a constructed parser.
    #[must_use]
    pub fn cached_languages(&self) -> usize {
        self.parsers.read().map_or(0, |m| m.len())
    }

    fn parser_for(&self, lang: Lang) -> Result<Arc<Mutex<Parser>>> {
        if let Ok(cache) = self.parsers.read()
            && let Some(parser) = cache.get(&lang)
        {
            return Ok(Arc::clone(parser));
        }

        let grammar = lang
            .grammar()
            .ok_or_else(|| IndexError::UnsupportedLanguage(lang.id().to_owned()))?;
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

        let mut cache = self
            .parsers
            .write()
            .map_err(|_| IndexError::Parse("parser cache lock poisoned".into()))?;
        let entry = cache
            .entry(lang)
            .or_insert_with(|| Arc::new(Mutex::new(parser)));
        tracing::debug!(lang = lang.id(), "tree-sitter parser ready");
        Ok(Arc::clone(entry))
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&self, content: &str, lang: Lang, cancel: &CancellationToken) -> Result<SyntaxNode> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let parser = self.parser_for(lang)?;
        let tree = {
            let mut guard = parser
                .lock()
                .map_err(|_| IndexError::Parse(format!("{} parser lock poisoned", lang.id())))?;
            guard
                .parse(content, None)
                .ok_or_else(|| IndexError::Parse(format!("no tree produced for {}", lang.id())))?
        };

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(lang = lang.id(), "syntax errors recovered during parse");
        }
        convert(root, content, cancel)
    }

    fn supports_language(&self, lang: Lang) -> bool {
        lang.grammar().is_some()
    }

    fn name(&self) -> &'static str {
        "tree-sitter"
    }
}

/// A node whose named children are still being converted.
struct Frame<'tree> {
    node: Node<'tree>,
    pending: std::vec::IntoIter<Node<'tree>>,
    children: Vec<SyntaxNode>,
}

impl<'tree> Frame<'tree> {
    fn new(node: Node<'tree>) -> Self {
        let mut cursor = node.walk();
        let pending: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
        Self {
            node,
            pending: pending.into_iter(),
            children: Vec::new(),
        }
    }

    fn finish(self, source: &str) -> SyntaxNode {
        let node = self.node;
        SyntaxNode {
            kind: node.kind().to_owned(),
            name: entity_name(&node, source),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            children: self.children,
        }
    }
}

/// Post-order conversion with an explicit stack, so nesting depth is
/// bounded by heap rather than thread stack.
fn convert(root: Node<'_>, source: &str, cancel: &CancellationToken) -> Result<SyntaxNode> {
    let mut stack = vec![Frame::new(root)];
    while let Some(top) = stack.last_mut() {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        if let Some(child) = top.pending.next() {
            stack.push(Frame::new(child));
            continue;
        }
        let Some(done) = stack.pop() else { break };
        let node = done.finish(source);
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => return Ok(node),
        }
    }
    Err(IndexError::Parse("empty syntax tree".into()))
}

fn entity_name(node: &Node<'_>, source: &str) -> Option<String> {
    // impl blocks name their subject through the "type" field
    let field = node.child_by_field_name("name").or_else(|| {
        (node.kind() == "impl_item")
            .then(|| node.child_by_field_name("type"))
            .flatten()
    })?;
    let text = source.get(field.byte_range())?;
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

/// The parser variant available in this build: tree-sitter when any
/// grammar is compiled in, otherwise the fallback.
#[must_use]
pub fn default_parser() -> Arc<dyn SourceParser> {
    if Lang::ALL.iter().any(|l| l.grammar().is_some()) {
        TreeSitterParser::shared()
    } else {
        Arc::new(FallbackParser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_spans_whole_file() {
        let root = FallbackParser
            .parse("a\nb\nc\n", Lang::Unknown, &CancellationToken::new())
            .unwrap();
        assert_eq!(root.kind, FALLBACK_ROOT_KIND);
        assert!(root.is_leaf());
        assert_eq!((root.start_line, root.end_line), (1, 3));
        assert_eq!(root.end_byte, 6);
    }

    #[test]
    fn fallback_supports_everything() {
        for lang in Lang::ALL {
            assert!(FallbackParser.supports_language(lang));
        }
    }

    #[test]
    fn fallback_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = FallbackParser.parse("x", Lang::Rust, &cancel).unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    #[test]
    fn tree_sitter_rejects_languages_without_grammar() {
        let parser = TreeSitterParser::new();
        assert!(!parser.supports_language(Lang::Java));
        let err = parser
            .parse("class A {}", Lang::Java, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedLanguage(ref l) if l == "java"));
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn tree_sitter_parses_rust_with_one_indexed_lines() {
        let parser = TreeSitterParser::new();
        let src = "fn alpha() {}\n\nstruct Beta;\n";
        let root = parser.parse(src, Lang::Rust, &CancellationToken::new()).unwrap();
        assert_eq!(root.kind, "source_file");
        assert_eq!(root.children.len(), 2);
        let f = &root.children[0];
        assert_eq!(f.kind, "function_item");
        assert_eq!(f.name.as_deref(), Some("alpha"));
        assert_eq!((f.start_line, f.end_line), (1, 1));
        assert_eq!(f.text(src), "fn alpha() {}");
        assert_eq!(root.children[1].start_line, 3);
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn impl_item_named_after_type() {
        let parser = TreeSitterParser::new();
        let src = "impl<T> Wrapper<T> { fn get(&self) {} }";
        let root = parser.parse(src, Lang::Rust, &CancellationToken::new()).unwrap();
        assert_eq!(root.children[0].name.as_deref(), Some("Wrapper"));
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn parser_cache_reuses_instances() {
        let parser = TreeSitterParser::new();
        let cancel = CancellationToken::new();
        parser.parse("fn a() {}", Lang::Rust, &cancel).unwrap();
        parser.parse("fn b() {}", Lang::Rust, &cancel).unwrap();
        assert_eq!(parser.cached_languages(), 1);
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn tree_sitter_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = TreeSitterParser::new()
            .parse("fn a() {}", Lang::Rust, &cancel)
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    #[cfg(feature = "lang-config")]
    #[test]
    fn deeply_nested_json_converts() {
        let depth = 3000;
        let src = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let root = TreeSitterParser::new()
            .parse(&src, Lang::Json, &CancellationToken::new())
            .unwrap();
        assert_eq!(root.kind, "document");
        assert!(root.depth() > depth);
        assert_eq!(root.end_byte, src.len());
    }

    #[test]
    fn default_parser_matches_build() {
        let parser = default_parser();
        if cfg!(any(
            feature = "lang-rust",
            feature = "lang-python",
            feature = "lang-js",
            feature = "lang-go",
            feature = "lang-config"
        )) {
            assert_eq!(parser.name(), "tree-sitter");
        } else {
            assert_eq!(parser.name(), "fallback");
        }
    }
}
