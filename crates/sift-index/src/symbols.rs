//! Regex-based symbol extraction for chunks without structural names.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::languages::Lang;

/// Upper bound on symbols recorded per chunk.
pub const MAX_SYMBOLS_PER_CHUNK: usize = 100;

const COMMON_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "return", "break", "continue", "switch", "case", "default",
    "try", "catch", "finally", "throw", "new", "delete", "this", "self", "true", "false", "null",
    "nil", "none", "public", "private", "protected", "static", "const", "final", "async",
    "await", "yield", "import", "export", "from", "package", "module", "interface", "class",
    "struct", "enum", "func", "function", "def", "fn", "var", "let", "val", "type", "typedef",
    "void", "int", "string", "bool", "float", "and", "or", "not", "in", "is", "as", "with",
    "using", "abstract", "virtual", "override", "extends", "implements",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static PATTERNS: LazyLock<HashMap<Lang, Vec<Regex>>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert(
        Lang::Rust,
        compile(&[
            r"fn\s+(\w+)\s*[<(]",
            r"struct\s+(\w+)",
            r"enum\s+(\w+)",
            r"trait\s+(\w+)",
            r"impl\s+(?:<[^>]+>\s+)?(\w+)",
            r"mod\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Go,
        compile(&[
            r"func\s+(\w+)\s*\(",
            r"func\s*\([^)]+\)\s*(\w+)\s*\(",
            r"type\s+(\w+)\s+(?:struct|interface)",
            r"const\s+(\w+)\s*=",
            r"var\s+(\w+)\s+",
        ]),
    );
    m.insert(
        Lang::Python,
        compile(&[
            r"def\s+(\w+)\s*\(",
            r"class\s+(\w+)",
            r"@(\w+)",
            r#"(\w+)\s*=\s*(?:lambda|\[|\{|")"#,
        ]),
    );
    m.insert(
        Lang::TypeScript,
        compile(&[
            r"(?:function|async\s+function)\s+(\w+)\s*\(",
            r"(?:class|interface|type|enum)\s+(\w+)",
            r"(?:const|let|var)\s+(\w+)\s*[=:]",
        ]),
    );
    m.insert(
        Lang::JavaScript,
        compile(&[
            r"(?:function|async\s+function)\s+(\w+)\s*\(",
            r"class\s+(\w+)",
            r"(?:const|let|var)\s+(\w+)\s*=",
        ]),
    );
    m.insert(
        Lang::Java,
        compile(&[
            r"(?:public|private|protected)?\s*(?:static)?\s*\w+\s+(\w+)\s*\(",
            r"class\s+(\w+)",
            r"interface\s+(\w+)",
            r"enum\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::CSharp,
        compile(&[
            r"(?:public|private|protected|internal)?\s*(?:static|async)?\s*\w+\s+(\w+)\s*\(",
            r"class\s+(\w+)",
            r"interface\s+(\w+)",
            r"struct\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Kotlin,
        compile(&[
            r"fun\s+(?:<[^>]+>\s+)?(\w+)\s*\(",
            r"class\s+(\w+)",
            r"interface\s+(\w+)",
            r"object\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Swift,
        compile(&[
            r"func\s+(\w+)\s*[(<]",
            r"class\s+(\w+)",
            r"struct\s+(\w+)",
            r"protocol\s+(\w+)",
            r"enum\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Scala,
        compile(&[
            r"def\s+(\w+)\s*[\[(]",
            r"class\s+(\w+)",
            r"object\s+(\w+)",
            r"trait\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Ruby,
        compile(&[r"def\s+(\w+)", r"class\s+(\w+)", r"module\s+(\w+)"]),
    );
    m.insert(
        Lang::Php,
        compile(&[
            r"function\s+(\w+)\s*\(",
            r"class\s+(\w+)",
            r"interface\s+(\w+)",
            r"trait\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::C,
        compile(&[
            r"(?:\w+\s+)+(\w+)\s*\([^)]*\)\s*\{",
            r"struct\s+(\w+)",
            r"typedef\s+(?:struct\s+)?(?:\w+\s+)+(\w+)\s*;",
            r"#define\s+(\w+)",
        ]),
    );
    m.insert(
        Lang::Cpp,
        compile(&[
            r"(?:\w+\s+)+(\w+)\s*\([^)]*\)\s*(?:const)?\s*\{",
            r"class\s+(\w+)",
            r"struct\s+(\w+)",
            r"namespace\s+(\w+)",
        ]),
    );
    m
});

static GENERIC: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?:function|func|def|fn)\s+(\w+)\s*\(",
        r"(?:class|struct|interface|type)\s+(\w+)",
    ])
});

fn is_valid_symbol(s: &str) -> bool {
    s.len() >= 2 && !COMMON_KEYWORDS.contains(&s.to_ascii_lowercase().as_str())
}

/// Declared names found in `content`, in pattern order, de-duplicated and
/// capped at [`MAX_SYMBOLS_PER_CHUNK`].
///
/// Languages without dedicated patterns use a generic function/type set.
#[must_use]
pub fn extract_symbols(content: &str, lang: Lang) -> Vec<String> {
    let patterns = PATTERNS.get(&lang).unwrap_or(&GENERIC);
    let mut symbols: Vec<String> = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(content) {
            let Some(m) = caps.get(1) else {
                continue;
            };
            let symbol = m.as_str();
            if is_valid_symbol(symbol) && !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_owned());
                if symbols.len() >= MAX_SYMBOLS_PER_CHUNK {
                    return symbols;
                }
            }
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_symbols() {
        let src = "pub struct Config {}\nimpl Config { fn load() {} }\nenum Mode { A }";
        let syms = extract_symbols(src, Lang::Rust);
        assert!(syms.contains(&"load".to_string()));
        assert!(syms.contains(&"Config".to_string()));
        assert!(syms.contains(&"Mode".to_string()));
        assert_eq!(syms.iter().filter(|s| *s == "Config").count(), 1);
    }

    #[test]
    fn go_methods_and_types() {
        let src = "type Server struct {}\nfunc (s *Server) Start() {}\nfunc main() {}";
        let syms = extract_symbols(src, Lang::Go);
        assert_eq!(syms, vec!["main", "Start", "Server"]);
    }

    #[test]
    fn keywords_and_short_names_filtered() {
        let syms = extract_symbols("def x(): pass\ndef self(): pass\ndef run(): pass", Lang::Python);
        assert_eq!(syms, vec!["run"]);
    }

    #[test]
    fn generic_patterns_for_unlisted_languages() {
        let syms = extract_symbols("function doThing() {}\nclass Widget", Lang::Unknown);
        assert_eq!(syms, vec!["doThing", "Widget"]);
    }

    #[test]
    fn symbol_count_capped() {
        let src: String = (0..150).map(|i| format!("fn f{i}() {{}}\n")).collect();
        assert_eq!(extract_symbols(&src, Lang::Rust).len(), MAX_SYMBOLS_PER_CHUNK);
    }
}
