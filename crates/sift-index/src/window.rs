//! Fixed-size line windows for files without structural chunks.

use crate::chunker::Chunk;
use crate::languages::Lang;
use crate::symbols::extract_symbols;

pub const DEFAULT_MAX_LINES: usize = 60;

/// Window size and overlap, both in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub max_lines: usize,
    pub overlap: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            overlap: 0,
        }
    }
}

/// Split `content` into consecutive windows of at most `max_lines` lines.
///
/// Window `i + 1` starts `max_lines - overlap` lines after window `i`; the
/// last window ends at the last line. A zero `max_lines` is treated as 1 and
/// an overlap that would stall the walk is reduced so every window advances
/// by at least one line. Empty content yields no windows.
#[must_use]
pub fn line_windows(content: &str, lang: Lang, max_lines: usize, overlap: usize) -> Vec<Chunk> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let max_lines = max_lines.max(1);
    let step = max_lines.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max_lines).min(lines.len());
        let text: String = lines[start..end].concat();
        windows.push(Chunk {
            symbols: extract_symbols(&text, lang),
            content: text,
            start_line: start + 1,
            end_line: end,
            language: lang,
            node_type: String::new(),
        });
        if end == lines.len() {
            break;
        }
        start += step;
    }
    windows
}
