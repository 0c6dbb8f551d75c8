//! Language detection and tree-sitter grammar registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language tag attached to documents and chunks.
///
/// Only some variants carry a compiled grammar; the rest are detected so
/// that symbol extraction and payloads stay language-aware, but they are
/// chunked through the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Bash,
    Toml,
    Json,
    Markdown,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Scala,
    Yaml,
    Sql,
    Html,
    Css,
    Dockerfile,
    Makefile,
    Unknown,
}

impl Lang {
    pub const ALL: [Lang; 25] = [
        Self::Rust,
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Go,
        Self::Bash,
        Self::Toml,
        Self::Json,
        Self::Markdown,
        Self::Java,
        Self::C,
        Self::Cpp,
        Self::CSharp,
        Self::Ruby,
        Self::Php,
        Self::Swift,
        Self::Kotlin,
        Self::Scala,
        Self::Yaml,
        Self::Sql,
        Self::Html,
        Self::Css,
        Self::Dockerfile,
        Self::Makefile,
        Self::Unknown,
    ];

    /// Identifier used in stored records and config.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Scala => "scala",
            Self::Yaml => "yaml",
            Self::Sql => "sql",
            Self::Html => "html",
            Self::Css => "css",
            Self::Dockerfile => "dockerfile",
            Self::Makefile => "makefile",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of [`Lang::id`].
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.id() == id)
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Toml => Some(tree_sitter_toml_ng::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Markdown => Some(tree_sitter_md::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension, falling back to well-known file names.
#[must_use]
pub fn detect_language(path: &Path) -> Lang {
    if let Some(lang) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(lang_for_extension)
    {
        return lang;
    }

    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if base == "dockerfile" || base.starts_with("dockerfile.") {
        Lang::Dockerfile
    } else if base == "makefile" || base == "gnumakefile" {
        Lang::Makefile
    } else {
        Lang::Unknown
    }
}

fn lang_for_extension(ext: &str) -> Option<Lang> {
    let lang = match ext.to_ascii_lowercase().as_str() {
        "rs" => Lang::Rust,
        "py" | "pyi" => Lang::Python,
        "js" | "jsx" | "mjs" | "cjs" => Lang::JavaScript,
        "ts" | "tsx" | "mts" | "cts" => Lang::TypeScript,
        "go" => Lang::Go,
        "sh" | "bash" | "zsh" => Lang::Bash,
        "toml" => Lang::Toml,
        "json" | "jsonc" => Lang::Json,
        "md" | "markdown" => Lang::Markdown,
        "java" => Lang::Java,
        "c" | "h" => Lang::C,
        "cpp" | "cc" | "cxx" | "hpp" => Lang::Cpp,
        "cs" => Lang::CSharp,
        "rb" => Lang::Ruby,
        "php" => Lang::Php,
        "swift" => Lang::Swift,
        "kt" | "kts" => Lang::Kotlin,
        "scala" => Lang::Scala,
        "yaml" | "yml" => Lang::Yaml,
        "sql" => Lang::Sql,
        "html" | "htm" => Lang::Html,
        "css" | "scss" | "less" => Lang::Css,
        _ => return None,
    };
    Some(lang)
}

/// Check if a file has a known language, i.e. is worth indexing as text.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    detect_language(path) != Lang::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_rs() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Lang::Rust);
    }

    #[test]
    fn detect_language_js_variants() {
        for ext in &["js", "jsx", "mjs", "cjs"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Lang::JavaScript,
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_is_case_insensitive() {
        assert_eq!(detect_language(Path::new("Main.JAVA")), Lang::Java);
        assert_eq!(detect_language(Path::new("x.R.py")), Lang::Python);
    }

    #[test]
    fn detect_language_special_file_names() {
        assert_eq!(detect_language(Path::new("Dockerfile")), Lang::Dockerfile);
        assert_eq!(
            detect_language(Path::new("deploy/dockerfile.prod")),
            Lang::Dockerfile
        );
        assert_eq!(detect_language(Path::new("GNUmakefile")), Lang::Makefile);
    }

    #[test]
    fn detect_language_unknown_ext() {
        assert_eq!(detect_language(Path::new("file.xyz")), Lang::Unknown);
        assert_eq!(detect_language(Path::new("file")), Lang::Unknown);
        assert!(!is_indexable(Path::new("blob.bin")));
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
        }
        #[cfg(feature = "lang-go")]
        assert!(Lang::Go.grammar().is_some());
        #[cfg(feature = "lang-config")]
        assert!(Lang::Toml.grammar().is_some());
    }

    #[test]
    fn fallback_only_languages_have_no_grammar() {
        assert!(Lang::Java.grammar().is_none());
        assert!(Lang::Unknown.grammar().is_none());
    }

    #[test]
    fn lang_id_roundtrip() {
        for lang in Lang::ALL {
            assert!(!lang.id().is_empty());
            assert_eq!(lang.to_string(), lang.id());
            assert_eq!(Lang::from_id(lang.id()), Some(lang));
        }
        assert_eq!(Lang::from_id("cobol"), None);
    }
}
