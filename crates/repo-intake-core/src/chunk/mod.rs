//! Semantic chunk extraction.
//!
//! Turns fetched source files into typed [`CodeChunk`]s: functions,
//! classes, components, hooks, types, an aggregated import block, flagged
//! comments, and whole-file config chunks.
//!
//! # Algorithm
//!
//! 1. Resolve the file's [`LanguageFamily`] from its language tag.
//! 2. Run every [`ChunkMatcher`] that applies to the family; each yields
//!    spans with a start line (from the match offset) and an end line
//!    (from block boundary detection, capped at `max_chunk_lines`).
//! 3. Resolve spans that start on the same line: the construct with the
//!    highest precedence wins (component > hook > function > class > type).
//! 4. Add one `import` chunk for the first contiguous import block.
//! 5. Add one `comment` chunk per flagged comment line.
//! 6. For config-designated files, add one whole-file `config` chunk.
//! 7. Drop chunks shorter than `min_chunk_chars`.
//!
//! Chunk identity is a pure function of path, type, name and start line,
//! so re-extracting an unchanged file yields identical ids.
//!
//! Extraction never fails. Input that matches nothing produces no chunks.

pub mod matchers;
pub mod span;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::analysis::find_flagged_comments;
use crate::conventions::is_config_designated;
use crate::language::{family_of, LanguageFamily};
use crate::models::{ChunkMetadata, ChunkType, CodeChunk, FetchedFile};

pub use matchers::{default_matchers, ChunkMatcher, RegexMatcher};
pub use span::{SourceText, Span};

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Extraction limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Chunks with fewer trimmed characters are discarded as noise.
    pub min_chunk_chars: usize,
    /// Upper bound on the lines of a single structural chunk.
    pub max_chunk_lines: usize,
    pub include_imports: bool,
    pub include_comments: bool,
    pub include_config: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: 10,
            max_chunk_lines: 200,
            include_imports: true,
            include_comments: true,
            include_config: true,
        }
    }
}

/// Estimate tokens as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Deterministic chunk id.
///
/// Named chunks: `{path}:{type}:{name}:{start_line}`; unnamed chunks:
/// `{path}:{type}:L{start_line}`; config chunks: `{path}:config`.
pub fn chunk_id(path: &str, chunk_type: ChunkType, name: Option<&str>, start_line: usize) -> String {
    match (chunk_type, name) {
        (ChunkType::Config, _) => format!("{}:config", path),
        (_, Some(name)) => format!("{}:{}:{}:{}", path, chunk_type, name, start_line),
        (_, None) => format!("{}:{}:L{}", path, chunk_type, start_line),
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extracts chunks using a set of matchers.
pub struct ChunkExtractor {
    config: ChunkerConfig,
    custom: Vec<Box<dyn ChunkMatcher>>,
    use_defaults: bool,
}

impl ChunkExtractor {
    /// Extractor with the built-in regex matchers.
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            custom: Vec::new(),
            use_defaults: true,
        }
    }

    /// Extractor with only the given matchers.
    pub fn with_matchers(config: ChunkerConfig, matchers: Vec<Box<dyn ChunkMatcher>>) -> Self {
        Self {
            config,
            custom: matchers,
            use_defaults: false,
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    fn matchers_for(&self, family: LanguageFamily) -> Vec<&dyn ChunkMatcher> {
        let defaults: &[RegexMatcher] = if self.use_defaults {
            default_matchers()
        } else {
            &[]
        };
        defaults
            .iter()
            .map(|m| m as &dyn ChunkMatcher)
            .chain(self.custom.iter().map(|m| m.as_ref()))
            .filter(|m| m.applies_to(family))
            .collect()
    }

    /// Extract all chunks from one file.
    pub fn extract(&self, path: &str, language: Option<&str>, content: &str) -> Vec<CodeChunk> {
        let family = family_of(language);
        let source = SourceText::new(content, family);
        let mut chunks = Vec::new();

        for (chunk_type, span) in self.structural_spans(&source) {
            self.push_span(&mut chunks, &source, path, language, chunk_type, &span);
        }

        if self.config.include_imports {
            if let Some((start, end)) = import_block(&source) {
                let span = Span {
                    start_line: start,
                    end_line: end,
                    name: None,
                    export_kind: None,
                };
                self.push_span(&mut chunks, &source, path, language, ChunkType::Import, &span);
            }
        }

        if self.config.include_comments {
            for flagged in find_flagged_comments(content) {
                let span = Span {
                    start_line: flagged.line,
                    end_line: flagged.line,
                    name: None,
                    export_kind: None,
                };
                self.push_span(&mut chunks, &source, path, language, ChunkType::Comment, &span);
            }
        }

        if self.config.include_config && is_config_designated(path) && source.line_count() > 0 {
            let span = Span {
                start_line: 1,
                end_line: source.line_count(),
                name: path.rsplit('/').next().map(str::to_string),
                export_kind: None,
            };
            self.push_span(&mut chunks, &source, path, language, ChunkType::Config, &span);
        }

        chunks.sort_by_key(|c| (c.metadata.start_line, c.chunk_type));
        chunks
    }

    /// Extract chunks from every fetched file, in file order.
    pub fn extract_files(&self, files: &[FetchedFile]) -> Vec<CodeChunk> {
        files
            .iter()
            .flat_map(|f| self.extract(f.path(), f.language(), &f.content))
            .collect()
    }

    fn structural_spans(&self, source: &SourceText<'_>) -> Vec<(ChunkType, Span)> {
        let mut by_line: BTreeMap<usize, (ChunkType, Span)> = BTreeMap::new();
        for matcher in self.matchers_for(source.family) {
            let chunk_type = matcher.chunk_type();
            for span in matcher.find_spans(source, self.config.max_chunk_lines) {
                let outranked = by_line
                    .get(&span.start_line)
                    .map(|(existing, _)| {
                        matchers::overlap_rank(*existing) >= matchers::overlap_rank(chunk_type)
                    })
                    .unwrap_or(false);
                if !outranked {
                    by_line.insert(span.start_line, (chunk_type, span));
                }
            }
        }
        by_line.into_values().collect()
    }

    fn push_span(
        &self,
        chunks: &mut Vec<CodeChunk>,
        source: &SourceText<'_>,
        path: &str,
        language: Option<&str>,
        chunk_type: ChunkType,
        span: &Span,
    ) {
        let content = if chunk_type == ChunkType::Config {
            source.content.to_string()
        } else {
            source.slice(span.start_line, span.end_line)
        };
        if content.trim().chars().count() < self.config.min_chunk_chars {
            return;
        }
        chunks.push(CodeChunk {
            id: chunk_id(path, chunk_type, span.name.as_deref(), span.start_line),
            chunk_type,
            hash: content_hash(&content),
            metadata: ChunkMetadata {
                path: path.to_string(),
                start_line: span.start_line,
                end_line: span.end_line.max(span.start_line),
                language: language.map(str::to_string),
                token_count: estimate_tokens(&content),
                name: span.name.clone(),
                export_kind: span.export_kind,
            },
            content,
        });
    }
}

impl Default for ChunkExtractor {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// First contiguous import block as 1-based inclusive lines.
///
/// Blank lines and comment lines inside the block are tolerated. Multi-line
/// statements continue while brackets are open.
fn import_block(source: &SourceText<'_>) -> Option<(usize, usize)> {
    let family = source.family;
    let comment = family.line_comment();
    let mut start = None;
    let mut end = 0;
    let mut depth = 0i32;

    for line_no in 1..=source.line_count() {
        let line = source.line(line_no);
        let trimmed = line.trim();

        if depth > 0 {
            depth += bracket_delta(line);
            end = line_no;
            continue;
        }
        if matchers::is_import_line(family, line) {
            start.get_or_insert(line_no);
            depth = bracket_delta(line).max(0);
            end = line_no;
            continue;
        }
        let skippable = trimmed.is_empty()
            || trimmed.starts_with(comment)
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("\"use ")
            || trimmed.starts_with("'use ")
            || trimmed.starts_with("package ");
        if skippable {
            continue;
        }
        if start.is_some() {
            break;
        }
        // Leading code before any import: the file has no header import block.
        if !trimmed.starts_with('#') && !trimmed.starts_with("@") {
            return None;
        }
    }
    start.map(|s| (s, end))
}

fn bracket_delta(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '(' | '{' | '[' => acc + 1,
        ')' | '}' | ']' => acc - 1,
        _ => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_TS: &str = "import { readFile } from 'fs';\nimport {\n  join,\n  resolve,\n} from 'path';\n\n// TODO: handle missing files\nexport function loadConfig(path: string) {\n  return readFile(join(path, 'config.json'));\n}\n\nexport default function App({ title }) {\n  return <h1>{title}</h1>;\n}\n\nexport const useTitle = () => {\n  return 'x';\n};\n\nexport interface Options {\n  verbose: boolean;\n}\n";

    fn extract(path: &str, content: &str) -> Vec<CodeChunk> {
        let language = crate::language::detect_language(path);
        ChunkExtractor::default().extract(path, language, content)
    }

    #[test]
    fn test_extracts_typed_chunks() {
        let chunks = extract("src/index.tsx", INDEX_TS);
        let kinds: Vec<(ChunkType, Option<&str>)> = chunks
            .iter()
            .map(|c| (c.chunk_type, c.metadata.name.as_deref()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ChunkType::Import, None),
                (ChunkType::Comment, None),
                (ChunkType::Function, Some("loadConfig")),
                (ChunkType::Component, Some("App")),
                (ChunkType::Hook, Some("useTitle")),
                (ChunkType::Type, Some("Options")),
            ]
        );
    }

    #[test]
    fn test_import_block_spans_multiline_imports() {
        let chunks = extract("src/index.tsx", INDEX_TS);
        let import = chunks.iter().find(|c| c.chunk_type == ChunkType::Import).unwrap();
        assert_eq!((import.metadata.start_line, import.metadata.end_line), (1, 5));
        assert_eq!(import.id, "src/index.tsx:import:L1");
    }

    #[test]
    fn test_chunk_ids_and_lines() {
        let chunks = extract("src/index.tsx", INDEX_TS);
        let func = chunks.iter().find(|c| c.chunk_type == ChunkType::Function).unwrap();
        assert_eq!(func.id, "src/index.tsx:function:loadConfig:8");
        assert_eq!((func.metadata.start_line, func.metadata.end_line), (8, 10));
        assert_eq!(func.metadata.export_kind, Some(crate::models::ExportKind::Named));

        let app = chunks.iter().find(|c| c.chunk_type == ChunkType::Component).unwrap();
        assert_eq!(app.metadata.export_kind, Some(crate::models::ExportKind::Default));

        let comment = chunks.iter().find(|c| c.chunk_type == ChunkType::Comment).unwrap();
        assert_eq!(comment.id, "src/index.tsx:comment:L7");
    }

    #[test]
    fn test_identity_is_stable() {
        let a = extract("src/index.tsx", INDEX_TS);
        let b = extract("src/index.tsx", INDEX_TS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        let chunks = extract("src/index.tsx", INDEX_TS);
        for chunk in &chunks {
            assert_eq!(chunk.metadata.token_count, estimate_tokens(&chunk.content));
        }
    }

    #[test]
    fn test_config_file_gets_whole_file_chunk() {
        let content = "{\n  \"name\": \"demo\",\n  \"version\": \"1.0.0\"\n}\n";
        let chunks = extract("package.json", content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Config);
        assert_eq!(chunks[0].id, "package.json:config");
        assert_eq!(chunks[0].content, content);
        assert_eq!(chunks[0].metadata.end_line, 4);
    }

    #[test]
    fn test_min_chars_discards_noise() {
        let chunks = extract("src/a.ts", "const f = () => 1;\n");
        assert!(chunks.iter().all(|c| c.content.trim().len() >= 10));
        let tiny = extract("src/a.ts", "type A=B\n");
        assert!(tiny.is_empty());
    }

    #[test]
    fn test_python_and_go() {
        let py = "import os\nfrom typing import List\n\nclass Repo:\n    def load(self):\n        return os.getcwd()\n";
        let chunks = extract("app/repo.py", py);
        let kinds: Vec<ChunkType> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(kinds, vec![ChunkType::Import, ChunkType::Class, ChunkType::Function]);
        let class = &chunks[1];
        assert_eq!((class.metadata.start_line, class.metadata.end_line), (4, 6));

        let go = "package main\n\nimport (\n\t\"fmt\"\n)\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";
        let chunks = extract("main.go", go);
        let import = chunks.iter().find(|c| c.chunk_type == ChunkType::Import).unwrap();
        assert_eq!((import.metadata.start_line, import.metadata.end_line), (3, 5));
        assert!(chunks.iter().any(|c| c.id == "main.go:function:main:7"));
    }

    #[test]
    fn test_malformed_input_never_panics() {
        for content in ["", "{{{{", "}}}}", "function (", "class", "\n\n\n", "export default {"] {
            let _ = extract("src/x.ts", content);
        }
        assert!(extract("notes/unknown.xyz", "random text\nmore").is_empty());
    }

    struct LineMatcher;

    impl ChunkMatcher for LineMatcher {
        fn chunk_type(&self) -> ChunkType {
            ChunkType::Function
        }

        fn applies_to(&self, family: LanguageFamily) -> bool {
            family == LanguageFamily::Other
        }

        fn find_spans(&self, source: &SourceText<'_>, _max_lines: usize) -> Vec<Span> {
            (1..=source.line_count())
                .filter(|&l| source.line(l).starts_with("proc "))
                .map(|l| Span {
                    start_line: l,
                    end_line: l,
                    name: source.line(l).split_whitespace().nth(1).map(str::to_string),
                    export_kind: None,
                })
                .collect()
        }
    }

    #[test]
    fn test_custom_matcher() {
        let extractor = ChunkExtractor::with_matchers(ChunkerConfig::default(), vec![Box::new(LineMatcher)]);
        let chunks = extractor.extract("script.tcl", None, "proc greet {} {}\nputs hi\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "script.tcl:function:greet:1");
    }
}
