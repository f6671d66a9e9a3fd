//! Regex-driven construct matchers, one set per language family.
//!
//! Each pattern is multi-line anchored at a line start and exposes a
//! `name` capture. Optional `export` and `default` captures mark the
//! construct's export kind.

use regex::Regex;
use std::sync::OnceLock;

use super::span::{SourceText, Span};
use crate::language::LanguageFamily;
use crate::models::{ChunkType, ExportKind};

/// Finds spans of one chunk type in source text.
///
/// The extractor only depends on this trait, so a parser-backed matcher
/// can replace the regex matchers for a single language family.
pub trait ChunkMatcher: Send + Sync {
    fn chunk_type(&self) -> ChunkType;

    fn applies_to(&self, family: LanguageFamily) -> bool;

    fn find_spans(&self, source: &SourceText<'_>, max_lines: usize) -> Vec<Span>;
}

/// A chunk type recognized by one or more regexes within a set of families.
pub struct RegexMatcher {
    chunk_type: ChunkType,
    families: &'static [LanguageFamily],
    patterns: Vec<Regex>,
    reserved: &'static [&'static str],
}

impl RegexMatcher {
    /// Compile a matcher. Invalid patterns are a programming error and
    /// surface as `Err`.
    pub fn new(
        chunk_type: ChunkType,
        families: &'static [LanguageFamily],
        patterns: &[&str],
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?m){}", p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            chunk_type,
            families,
            patterns,
            reserved: &[],
        })
    }

    /// Names that are keywords rather than declarations.
    pub fn with_reserved(mut self, reserved: &'static [&'static str]) -> Self {
        self.reserved = reserved;
        self
    }
}

impl ChunkMatcher for RegexMatcher {
    fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    fn applies_to(&self, family: LanguageFamily) -> bool {
        self.families.contains(&family)
    }

    fn find_spans(&self, source: &SourceText<'_>, max_lines: usize) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();
        for re in &self.patterns {
            for caps in re.captures_iter(source.content) {
                let Some(whole) = caps.get(0) else { continue };
                let name = caps.name("name").map(|m| m.as_str().to_string());
                if let Some(n) = &name {
                    if self.reserved.contains(&n.as_str()) {
                        continue;
                    }
                }
                let start_line = source.line_of_offset(whole.start());
                if spans.iter().any(|s| s.start_line == start_line) {
                    continue;
                }
                let export_kind = if caps.name("default").is_some() {
                    Some(ExportKind::Default)
                } else if caps.name("export").is_some() {
                    Some(ExportKind::Named)
                } else {
                    None
                };
                spans.push(Span {
                    start_line,
                    end_line: source.block_end(start_line, max_lines),
                    name,
                    export_kind,
                });
            }
        }
        spans.sort_by_key(|s| s.start_line);
        spans
    }
}

const JS: &[LanguageFamily] = &[LanguageFamily::JsTs];
const PY: &[LanguageFamily] = &[LanguageFamily::Python];
const RS: &[LanguageFamily] = &[LanguageFamily::Rust];
const GO: &[LanguageFamily] = &[LanguageFamily::Go];
const JVM: &[LanguageFamily] = &[LanguageFamily::JvmLike];
const RB: &[LanguageFamily] = &[LanguageFamily::Ruby];

const C_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "else", "sizeof", "throw", "using",
    "lock", "foreach", "when",
];

const JS_EXPORT: &str = r"^[ \t]*(?P<export>export\s+(?P<default>default\s+)?)?";
const RS_VIS: &str = r"^[ \t]*(?P<export>pub(?:\([^)]*\))?\s+)?";
const JVM_MODS: &str = r"^[ \t]*(?:(?:public|private|protected|internal|static|final|abstract|override|virtual|sealed|open|data|partial|suspend|async|synchronized|inline|extern|unsafe|readonly)\s+)*";

fn build_matchers() -> Result<Vec<RegexMatcher>, regex::Error> {
    let jsts = vec![
        RegexMatcher::new(
            ChunkType::Component,
            JS,
            &[
                &format!(r"{}(?:async\s+)?function\s+(?P<name>[A-Z][A-Za-z0-9_]*)\s*[(<]", JS_EXPORT),
                r"^[ \t]*(?P<export>export\s+)?(?:const|let|var)\s+(?P<name>[A-Z][A-Za-z0-9_]*)\s*(?::[^=\n]+)?=\s*(?:React\.)?(?:memo\(|forwardRef\()?\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=>",
                &format!(r"{}class\s+(?P<name>[A-Z][\w$]*)\s+extends\s+(?:React\.)?(?:Pure)?Component\b", JS_EXPORT),
            ],
        )?,
        RegexMatcher::new(
            ChunkType::Hook,
            JS,
            &[
                &format!(r"{}(?:async\s+)?function\s+(?P<name>use[A-Z][\w$]*)\s*[(<]", JS_EXPORT),
                r"^[ \t]*(?P<export>export\s+)?(?:const|let|var)\s+(?P<name>use[A-Z][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=>",
            ],
        )?,
        RegexMatcher::new(
            ChunkType::Function,
            JS,
            &[
                &format!(r"{}(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)\s*[(<]", JS_EXPORT),
                r"^[ \t]*(?P<export>export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=\n]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
            ],
        )?,
        RegexMatcher::new(
            ChunkType::Class,
            JS,
            &[&format!(r"{}(?:abstract\s+)?class\s+(?P<name>[A-Za-z_$][\w$]*)", JS_EXPORT)],
        )?,
        RegexMatcher::new(
            ChunkType::Type,
            JS,
            &[r"^[ \t]*(?P<export>export\s+)?(?:declare\s+)?(?:const\s+)?(?:interface|type|enum)\s+(?P<name>[A-Za-z_$][\w$]*)"],
        )?,
    ];

    let python = vec![
        RegexMatcher::new(
            ChunkType::Function,
            PY,
            &[r"^[ \t]*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*\("],
        )?,
        RegexMatcher::new(ChunkType::Class, PY, &[r"^[ \t]*class\s+(?P<name>[A-Za-z_]\w*)"])?,
    ];

    let rust = vec![
        RegexMatcher::new(
            ChunkType::Function,
            RS,
            &[&format!(
                r#"{}(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>[A-Za-z_]\w*)"#,
                RS_VIS
            )],
        )?,
        RegexMatcher::new(
            ChunkType::Class,
            RS,
            &[r"^[ \t]*(?:unsafe\s+)?impl(?:<[^{\n]*?>)?\s+(?:[\w:]+(?:<[^{\n]*?>)?\s+for\s+)?(?P<name>[A-Za-z_]\w*)"],
        )?,
        RegexMatcher::new(
            ChunkType::Type,
            RS,
            &[&format!(r"{}(?:struct|enum|trait|type|union)\s+(?P<name>[A-Za-z_]\w*)", RS_VIS)],
        )?,
    ];

    let go = vec![
        RegexMatcher::new(
            ChunkType::Function,
            GO,
            &[r"^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)"],
        )?,
        RegexMatcher::new(ChunkType::Type, GO, &[r"^type\s+(?P<name>[A-Za-z_]\w*)\b"])?,
    ];

    let jvm = vec![
        RegexMatcher::new(
            ChunkType::Class,
            JVM,
            &[&format!(r"{}(?:class|object|struct|record)\s+(?P<name>[A-Za-z_]\w*)", JVM_MODS)],
        )?,
        RegexMatcher::new(
            ChunkType::Type,
            JVM,
            &[&format!(
                r"{}(?:interface|protocol|enum(?:\s+class)?)\s+(?P<name>[A-Za-z_]\w*)",
                JVM_MODS
            )],
        )?,
        RegexMatcher::new(
            ChunkType::Function,
            JVM,
            &[
                &format!(r"{}(?:fun|func)\s+(?:<[^>\n]*>\s*)?(?:[\w.]+\.)?(?P<name>[A-Za-z_]\w*)\s*[(<]", JVM_MODS),
                r"^[ \t]*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+(?P<name>[A-Za-z_]\w*)\s*\(",
                &format!(r"{}(?:[\w<>\[\],.?*&:]+\s+)+(?P<name>[A-Za-z_]\w*)\s*\([^;\n]*$", JVM_MODS),
            ],
        )?
        .with_reserved(C_KEYWORDS),
    ];

    let ruby = vec![
        RegexMatcher::new(
            ChunkType::Function,
            RB,
            &[r"^[ \t]*def\s+(?:self\.)?(?P<name>[A-Za-z_]\w*[?!=]?)"],
        )?,
        RegexMatcher::new(
            ChunkType::Class,
            RB,
            &[r"^[ \t]*(?:class|module)\s+(?P<name>[A-Z][\w:]*)"],
        )?,
    ];

    Ok([jsts, python, rust, go, jvm, ruby].into_iter().flatten().collect())
}

/// The built-in regex matchers for every supported family.
pub fn default_matchers() -> &'static [RegexMatcher] {
    static MATCHERS: OnceLock<Vec<RegexMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| build_matchers().unwrap_or_default())
}

/// Whether a line opens an import statement in the given family.
pub fn is_import_line(family: LanguageFamily, line: &str) -> bool {
    static RES: OnceLock<Vec<(LanguageFamily, Regex)>> = OnceLock::new();
    let res = RES.get_or_init(|| {
        [
            (LanguageFamily::JsTs, r#"^\s*(?:import\b|export\s+(?:\*|\{[^}]*\})\s+from\b|(?:const|let|var)\s+[\w{}\s,]+=\s*require\()"#),
            (LanguageFamily::Python, r"^(?:import|from)\s+\S"),
            (LanguageFamily::Rust, r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:use\s+|extern\s+crate\s+)"),
            (LanguageFamily::Go, r"^import\b"),
            (LanguageFamily::JvmLike, r"^\s*(?:import\s|using\s+[\w.]+\s*;|#include\b|use\s+[\w\\]+)"),
            (LanguageFamily::Ruby, r"^\s*require(?:_relative)?\b"),
        ]
        .into_iter()
        .filter_map(|(family, pattern)| Regex::new(pattern).ok().map(|re| (family, re)))
        .collect()
    });
    res.iter()
        .any(|(f, re)| *f == family && re.is_match(line))
}

/// Precedence among structural chunks that start on the same line.
/// Higher wins.
pub fn overlap_rank(chunk_type: ChunkType) -> u8 {
    match chunk_type {
        ChunkType::Component => 5,
        ChunkType::Hook => 4,
        ChunkType::Function => 3,
        ChunkType::Class => 2,
        ChunkType::Type => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_of(chunk_type: ChunkType, family: LanguageFamily, content: &str) -> Vec<Span> {
        let source = SourceText::new(content, family);
        default_matchers()
            .iter()
            .filter(|m| m.chunk_type() == chunk_type && m.applies_to(family))
            .flat_map(|m| m.find_spans(&source, 200))
            .collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        assert!(build_matchers().is_ok());
        assert!(!default_matchers().is_empty());
    }

    #[test]
    fn test_js_function_forms() {
        let content = "export default function handler(req) {\n  return 1;\n}\nconst add = (a, b) => a + b;\nexport const run = async () => {\n  await go();\n};\n";
        let spans = spans_of(ChunkType::Function, LanguageFamily::JsTs, content);
        let names: Vec<_> = spans.iter().map(|s| s.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["handler", "add", "run"]);
        assert_eq!(spans[0].export_kind, Some(ExportKind::Default));
        assert_eq!(spans[1].export_kind, None);
        assert_eq!(spans[2].export_kind, Some(ExportKind::Named));
        assert_eq!((spans[2].start_line, spans[2].end_line), (5, 7));
    }

    #[test]
    fn test_component_and_hook() {
        let content = "export function UserCard({ user }) {\n  return <div>{user.name}</div>;\n}\nexport const useUser = (id) => {\n  return id;\n};\n";
        let components = spans_of(ChunkType::Component, LanguageFamily::JsTs, content);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name.as_deref(), Some("UserCard"));
        assert_eq!(components[0].end_line, 3);
        let hooks = spans_of(ChunkType::Hook, LanguageFamily::JsTs, content);
        assert_eq!(hooks[0].name.as_deref(), Some("useUser"));
    }

    #[test]
    fn test_rust_constructs() {
        let content = "pub struct Point { x: i32 }\n\nimpl Display for Point {\n    fn fmt(&self) {}\n}\n\npub(crate) async fn load() -> Result<()> {\n    Ok(())\n}\n";
        let types = spans_of(ChunkType::Type, LanguageFamily::Rust, content);
        assert_eq!(types[0].name.as_deref(), Some("Point"));
        assert_eq!(types[0].export_kind, Some(ExportKind::Named));
        let impls = spans_of(ChunkType::Class, LanguageFamily::Rust, content);
        assert_eq!(impls[0].name.as_deref(), Some("Point"));
        assert_eq!((impls[0].start_line, impls[0].end_line), (3, 5));
        let fns: Vec<_> = spans_of(ChunkType::Function, LanguageFamily::Rust, content)
            .into_iter()
            .filter_map(|s| s.name)
            .collect();
        assert_eq!(fns, vec!["fmt", "load"]);
    }

    #[test]
    fn test_jvm_skips_control_flow_keywords() {
        let content = "public class Greeter {\n    public String greet(String name) {\n        if (name == null) {\n            return \"hi\";\n        } else if (x) {\n        }\n        return name;\n    }\n}\n";
        let fns = spans_of(ChunkType::Function, LanguageFamily::JvmLike, content);
        assert_eq!(fns.len(), 1);
        assert_eq!(fns[0].name.as_deref(), Some("greet"));
        assert_eq!((fns[0].start_line, fns[0].end_line), (2, 8));
    }

    #[test]
    fn test_kotlin_enum_class_is_a_type() {
        let content = "enum class Color {\n    RED\n}\n";
        assert!(spans_of(ChunkType::Class, LanguageFamily::JvmLike, content).is_empty());
        let types = spans_of(ChunkType::Type, LanguageFamily::JvmLike, content);
        assert_eq!(types[0].name.as_deref(), Some("Color"));
    }

    #[test]
    fn test_import_lines() {
        assert!(is_import_line(LanguageFamily::JsTs, "import React from 'react';"));
        assert!(is_import_line(LanguageFamily::JsTs, "const fs = require('fs');"));
        assert!(is_import_line(LanguageFamily::Python, "from os import path"));
        assert!(is_import_line(LanguageFamily::Rust, "use std::fmt;"));
        assert!(is_import_line(LanguageFamily::Go, "import ("));
        assert!(!is_import_line(LanguageFamily::JsTs, "const important = 1;"));
        assert!(!is_import_line(LanguageFamily::Other, "import x"));
    }
}
