//! Core data models shared by every stage of the intake pipeline.
//!
//! These types describe a repository snapshot ([`FileNode`]), the ranked
//! subset chosen for analysis ([`ScoredFile`], [`SelectionResult`]), the
//! realized file bodies ([`FetchedFile`]), and the extracted units of
//! meaning ([`CodeChunk`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a listing entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One entry of a repository listing. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    /// Repository-relative path using `/` separators.
    pub path: String,
    pub kind: FileKind,
    /// Byte size as reported by the source host (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Content-addressing handle (git blob SHA).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Language tag inferred from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FileNode {
    /// Build a file entry, inferring the language from its path.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let language = crate::language::detect_language(&path).map(str::to_string);
        Self {
            path,
            kind: FileKind::File,
            size: Some(size),
            sha: None,
            language,
        }
    }

    /// Build a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Directory,
            size: None,
            sha: None,
            language: None,
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// The final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// Lowercased extension of a path, without the leading dot.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Why a file was selected. A file holds exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileCategory {
    Critical,
    EntryPoint,
    Config,
    HighComplexity,
    RecentlyModified,
    Standard,
}

impl FileCategory {
    pub const ALL: [FileCategory; 6] = [
        FileCategory::Critical,
        FileCategory::EntryPoint,
        FileCategory::Config,
        FileCategory::HighComplexity,
        FileCategory::RecentlyModified,
        FileCategory::Standard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Critical => "critical",
            FileCategory::EntryPoint => "entry-point",
            FileCategory::Config => "config",
            FileCategory::HighComplexity => "high-complexity",
            FileCategory::RecentlyModified => "recently-modified",
            FileCategory::Standard => "standard",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing entry plus its selection score and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFile {
    #[serde(flatten)]
    pub node: FileNode,
    /// Non-negative relevance score.
    pub score: f64,
    pub category: FileCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_of_code: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_flagged_comments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<usize>,
}

impl ScoredFile {
    pub fn new(node: FileNode, score: f64, category: FileCategory) -> Self {
        Self {
            node,
            score,
            category,
            lines_of_code: None,
            has_flagged_comments: None,
            complexity: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.node.path
    }

    pub fn size(&self) -> u64 {
        self.node.size.unwrap_or(0)
    }
}

/// Aggregate view of a selection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Number of listing entries considered (files and directories).
    pub total_considered: usize,
    /// Number of files that passed eligibility checks.
    pub total_eligible: usize,
    pub selected_count: usize,
    /// Cumulative byte size of the selected files.
    pub total_size: u64,
    pub by_category: BTreeMap<FileCategory, usize>,
    pub entry_points: Vec<String>,
    pub priority_files: Vec<String>,
}

/// Ordered, budget-bounded subset of a listing.
///
/// Invariants: `files` is score-descending with ties in listing order,
/// `files.len() <= max_files` and the summed sizes `<= max_total_bytes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub files: Vec<ScoredFile>,
    pub summary: SelectionSummary,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A flagged inline comment (TODO, FIXME, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedComment {
    pub tag: String,
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// Lightweight per-file analysis computed after fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub line_count: usize,
    pub flagged_comments: Vec<FlaggedComment>,
    /// Count of control-flow constructs, a coarse complexity proxy.
    pub complexity: usize,
}

/// A selected file with its realized text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedFile {
    #[serde(flatten)]
    pub file: ScoredFile,
    pub content: String,
    pub analysis: FileAnalysis,
}

impl FetchedFile {
    pub fn path(&self) -> &str {
        self.file.path()
    }

    pub fn language(&self) -> Option<&str> {
        self.file.node.language.as_deref()
    }
}

/// Kind of structural unit a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Component,
    Hook,
    Type,
    Import,
    Comment,
    Config,
}

impl ChunkType {
    pub const ALL: [ChunkType; 8] = [
        ChunkType::Function,
        ChunkType::Class,
        ChunkType::Component,
        ChunkType::Hook,
        ChunkType::Type,
        ChunkType::Import,
        ChunkType::Comment,
        ChunkType::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Component => "component",
            ChunkType::Hook => "hook",
            ChunkType::Type => "type",
            ChunkType::Import => "import",
            ChunkType::Comment => "comment",
            ChunkType::Config => "config",
        }
    }

    /// Retention priority when a token budget forces truncation.
    /// Lower values are dropped first.
    pub fn retention_priority(self) -> u8 {
        match self {
            ChunkType::Comment => 0,
            ChunkType::Import => 1,
            ChunkType::Type => 2,
            ChunkType::Hook => 3,
            ChunkType::Class => 4,
            ChunkType::Function => 5,
            ChunkType::Component => 6,
            ChunkType::Config => 7,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown chunk type: {}", s))
    }
}

/// How a symbol is exported from its module, when detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Default,
    Named,
}

/// Location and descriptive metadata of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_kind: Option<ExportKind>,
}

/// An addressable, typed substring of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    /// Stable identity: path + discriminator + start line.
    pub id: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub content: String,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// Repository-level metadata as reported by the source host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub default_branch: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub open_issues: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Repository size in kilobytes as reported by the host.
    #[serde(default)]
    pub size_kb: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("src/index.ts").as_deref(), Some("ts"));
        assert_eq!(extension_of("dist/bundle.min.JS").as_deref(), Some("js"));
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of(".gitignore"), None);
    }

    #[test]
    fn test_file_node_infers_language() {
        let node = FileNode::file("src/lib.rs", 120);
        assert_eq!(node.language.as_deref(), Some("rust"));
        assert_eq!(node.file_name(), "lib.rs");
        assert!(node.is_file());
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&FileCategory::EntryPoint).unwrap();
        assert_eq!(json, "\"entry-point\"");
    }

    #[test]
    fn test_chunk_type_from_str() {
        assert_eq!("Function".parse::<ChunkType>(), Ok(ChunkType::Function));
        assert!("widget".parse::<ChunkType>().is_err());
    }

    #[test]
    fn test_retention_priority_drops_comments_first() {
        assert!(ChunkType::Comment.retention_priority() < ChunkType::Function.retention_priority());
        assert!(ChunkType::Import.retention_priority() < ChunkType::Component.retention_priority());
        assert!(ChunkType::Import.retention_priority() < ChunkType::Config.retention_priority());
    }
}
