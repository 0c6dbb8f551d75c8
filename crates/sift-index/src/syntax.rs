//! Owned syntax tree produced by a [`SourceParser`](crate::parser::SourceParser).

/// One node of a parsed file.
///
/// Each node owns its children; the tree is rebuilt on every parse and
/// dropped once chunks are extracted. Lines are 1-indexed and inclusive
/// regardless of the parser that produced the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: String,
    pub name: Option<String>,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// The slice of `source` this node covers, or `""` if the range does
    /// not fit the given text.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start_byte..self.end_byte).unwrap_or_default()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Names declared by this node and its descendants, depth-first,
    /// de-duplicated, at most `cap` entries.
    #[must_use]
    pub fn declared_names(&self, cap: usize) -> Vec<String> {
        let mut names = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if names.len() >= cap {
                break;
            }
            if let Some(name) = node.name.as_deref()
                && !names.iter().any(|n| n == name)
            {
                names.push(name.to_owned());
            }
            stack.extend(node.children.iter().rev());
        }
        names
    }

    /// Total number of nodes in this subtree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Deepest nesting level below this node; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }
}

// Iterative so arbitrarily deep trees drop in constant stack.
impl Drop for SyntaxNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Number of lines in `content`, counting a final unterminated line and
/// treating empty text as a single line.
#[must_use]
pub fn line_count(content: &str) -> usize {
    content.lines().count().max(1)
}
