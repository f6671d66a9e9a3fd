//! Bounded text renderings of an analysis for downstream model prompts.
//!
//! - [`build_context_document`] renders the repository header and the
//!   fetched files grouped by category, capping each file and the whole
//!   document.
//! - [`fit_chunks_to_budget`] trims a chunk list to a token budget by
//!   dropping the least valuable chunk types first.

use serde::{Deserialize, Serialize};

use crate::chunk::estimate_tokens;
use crate::models::{CodeChunk, FetchedFile, FileCategory, RepositoryMetadata};

/// Character caps for [`build_context_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLimits {
    pub max_chars_per_file: usize,
    pub max_total_chars: usize,
}

impl Default for DocumentLimits {
    fn default() -> Self {
        Self {
            max_chars_per_file: 8_000,
            max_total_chars: 120_000,
        }
    }
}

fn category_heading(category: FileCategory) -> &'static str {
    match category {
        FileCategory::Critical => "Critical files",
        FileCategory::EntryPoint => "Entry points",
        FileCategory::Config => "Configuration",
        FileCategory::HighComplexity => "Core logic",
        FileCategory::RecentlyModified => "Recently modified",
        FileCategory::Standard => "Other files",
    }
}

fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

/// Render a repository header plus per-category file sections.
pub fn build_context_document(
    metadata: &RepositoryMetadata,
    files: &[FetchedFile],
    limits: DocumentLimits,
) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("# {}\n\n", metadata.full_name));
    if let Some(description) = metadata.description.as_deref().filter(|d| !d.is_empty()) {
        doc.push_str(description);
        doc.push_str("\n\n");
    }
    let mut facts = vec![format!("Default branch: {}", metadata.default_branch)];
    if let Some(language) = &metadata.language {
        facts.push(format!("Primary language: {}", language));
    }
    facts.push(format!("Stars: {}", metadata.stars));
    if let Some(license) = &metadata.license {
        facts.push(format!("License: {}", license));
    }
    doc.push_str(&facts.join(" | "));
    doc.push('\n');
    if !metadata.topics.is_empty() {
        doc.push_str(&format!("Topics: {}\n", metadata.topics.join(", ")));
    }

    let mut omitted = 0usize;
    for category in FileCategory::ALL {
        let group: Vec<&FetchedFile> = files.iter().filter(|f| f.file.category == category).collect();
        if group.is_empty() {
            continue;
        }
        let heading = format!("\n## {}\n", category_heading(category));
        let mut section_started = false;

        for file in group {
            let (body, truncated) = truncate_chars(&file.content, limits.max_chars_per_file);
            let fence = file.language().unwrap_or("");
            let mut section = format!(
                "\n### {} ({} lines)\n```{}\n{}",
                file.path(),
                file.analysis.line_count,
                fence,
                body
            );
            if !body.ends_with('\n') {
                section.push('\n');
            }
            if truncated {
                section.push_str("[truncated]\n");
            }
            section.push_str("```\n");

            let extra = if section_started { 0 } else { heading.len() };
            if doc.len() + extra + section.len() > limits.max_total_chars {
                omitted += 1;
                continue;
            }
            if !section_started {
                doc.push_str(&heading);
                section_started = true;
            }
            doc.push_str(&section);
        }
    }

    if omitted > 0 {
        doc.push_str(&format!("\n[{} more files omitted]\n", omitted));
    }
    doc
}

/// Keep the most valuable chunks that fit in `max_tokens`.
///
/// Chunks are dropped lowest retention priority first (comment, import,
/// type, hook, class, function, component, config); within one type, later
/// chunks go first. Survivors keep their original order.
pub fn fit_chunks_to_budget(chunks: &[CodeChunk], max_tokens: usize) -> Vec<CodeChunk> {
    let tokens: Vec<usize> = chunks
        .iter()
        .map(|c| match c.metadata.token_count {
            0 => estimate_tokens(&c.content),
            n => n,
        })
        .collect();
    let mut total: usize = tokens.iter().sum();
    if total <= max_tokens {
        return chunks.to_vec();
    }

    let mut drop_order: Vec<usize> = (0..chunks.len()).collect();
    drop_order.sort_by(|&a, &b| {
        chunks[a]
            .chunk_type
            .retention_priority()
            .cmp(&chunks[b].chunk_type.retention_priority())
            .then(b.cmp(&a))
    });

    let mut keep = vec![true; chunks.len()];
    for idx in drop_order {
        if total <= max_tokens {
            break;
        }
        keep[idx] = false;
        total -= tokens[idx];
    }

    chunks
        .iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then(|| c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_content;
    use crate::chunk::ChunkExtractor;
    use crate::models::{ChunkType, FileNode, ScoredFile};

    fn fetched(path: &str, category: FileCategory, content: &str) -> FetchedFile {
        FetchedFile {
            file: ScoredFile::new(FileNode::file(path, content.len() as u64), 1.0, category),
            content: content.to_string(),
            analysis: analyze_content(content),
        }
    }

    fn metadata() -> RepositoryMetadata {
        RepositoryMetadata {
            owner: "acme".into(),
            name: "app".into(),
            full_name: "acme/app".into(),
            description: Some("Demo app".into()),
            default_branch: "main".into(),
            language: Some("TypeScript".into()),
            stars: 42,
            ..Default::default()
        }
    }

    #[test]
    fn test_document_groups_by_category() {
        let files = vec![
            fetched("src/index.ts", FileCategory::EntryPoint, "export function main() {}\n"),
            fetched("README.md", FileCategory::Critical, "# App\n"),
        ];
        let doc = build_context_document(&metadata(), &files, DocumentLimits::default());
        assert!(doc.starts_with("# acme/app\n\nDemo app\n"));
        assert!(doc.contains("Primary language: TypeScript"));
        let critical = doc.find("## Critical files").unwrap();
        let entry = doc.find("## Entry points").unwrap();
        assert!(critical < entry);
        assert!(doc.contains("### src/index.ts (1 lines)\n```typescript\nexport function main() {}\n```"));
    }

    #[test]
    fn test_document_caps_file_and_total() {
        let big = "x".repeat(500);
        let files = vec![
            fetched("a.txt", FileCategory::Standard, &big),
            fetched("b.txt", FileCategory::Standard, &big),
        ];
        let limits = DocumentLimits {
            max_chars_per_file: 100,
            max_total_chars: 300,
        };
        let doc = build_context_document(&metadata(), &files, limits);
        assert!(doc.contains("[truncated]"));
        assert!(doc.contains("[1 more files omitted]"));
        assert!(!doc.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_fit_chunks_drops_low_priority_first() {
        let content = "import a from 'a';\n// TODO: remove the fallback path\nexport function keepMe(x) {\n  return x * 2;\n}\n";
        let chunks = ChunkExtractor::default().extract("src/k.ts", Some("typescript"), content);
        assert_eq!(chunks.len(), 3);
        let function_tokens = chunks
            .iter()
            .find(|c| c.chunk_type == ChunkType::Function)
            .unwrap()
            .metadata
            .token_count;

        let fitted = fit_chunks_to_budget(&chunks, function_tokens);
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].chunk_type, ChunkType::Function);

        let all = fit_chunks_to_budget(&chunks, usize::MAX);
        assert_eq!(all, chunks);
    }

    #[test]
    fn test_fit_chunks_preserves_order() {
        let content = "import a from 'a';\nexport function one() {\n  return 1;\n}\nexport function two() {\n  return 2;\n}\n";
        let chunks = ChunkExtractor::default().extract("src/k.ts", Some("typescript"), content);
        let import_tokens = chunks[0].metadata.token_count;
        let total: usize = chunks.iter().map(|c| c.metadata.token_count).sum();
        let fitted = fit_chunks_to_budget(&chunks, total - import_tokens);
        let names: Vec<_> = fitted.iter().filter_map(|c| c.metadata.name.as_deref()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
