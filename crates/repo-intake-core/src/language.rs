//! Language detection from file paths.
//!
//! Languages are identified by lowercase tags (`"typescript"`, `"rust"`, …)
//! and grouped into [`LanguageFamily`] values that share comment and block
//! syntax for chunk extraction.

use crate::models::extension_of;

/// Broad syntactic family used to pick chunk matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageFamily {
    /// JavaScript, TypeScript and their JSX variants.
    JsTs,
    Python,
    Rust,
    Go,
    /// Brace-delimited, C-descended languages (Java, Kotlin, C#, C, C++, Swift, Scala, PHP).
    JvmLike,
    Ruby,
    Other,
}

impl LanguageFamily {
    /// Whether blocks are delimited by `{` / `}`.
    pub fn uses_braces(self) -> bool {
        matches!(
            self,
            LanguageFamily::JsTs | LanguageFamily::Rust | LanguageFamily::Go | LanguageFamily::JvmLike
        )
    }

    /// Line-comment prefix for string/comment-aware scanning.
    pub fn line_comment(self) -> &'static str {
        match self {
            LanguageFamily::Python | LanguageFamily::Ruby => "#",
            _ => "//",
        }
    }
}

/// Detect a language tag from a repository path.
///
/// Returns `None` for files without a recognizable extension or name.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name {
        "Dockerfile" => return Some("dockerfile"),
        "Makefile" | "GNUmakefile" => return Some("makefile"),
        "Gemfile" | "Rakefile" => return Some("ruby"),
        _ => {}
    }

    let ext = extension_of(path)?;
    let lang = match ext.as_str() {
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "vue" => "vue",
        "svelte" => "svelte",
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "swift" => "swift",
        "cs" => "csharp",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        "php" => "php",
        "rb" => "ruby",
        "sh" | "bash" | "zsh" => "shell",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "mdx" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "sql" => "sql",
        _ => return None,
    };
    Some(lang)
}

/// Map a language tag to its syntactic family.
pub fn family_of(language: Option<&str>) -> LanguageFamily {
    match language {
        Some("typescript" | "tsx" | "javascript" | "jsx" | "vue" | "svelte") => LanguageFamily::JsTs,
        Some("python") => LanguageFamily::Python,
        Some("rust") => LanguageFamily::Rust,
        Some("go") => LanguageFamily::Go,
        Some("java" | "kotlin" | "scala" | "swift" | "csharp" | "c" | "cpp" | "php") => {
            LanguageFamily::JvmLike
        }
        Some("ruby") => LanguageFamily::Ruby,
        _ => LanguageFamily::Other,
    }
}

/// Whether the language tag denotes program source rather than data or docs.
pub fn is_source_language(language: Option<&str>) -> bool {
    !matches!(family_of(language), LanguageFamily::Other)
        || matches!(language, Some("shell" | "sql"))
}
