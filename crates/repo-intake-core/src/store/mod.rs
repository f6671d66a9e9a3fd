//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait is the seam between the index service and
//! its persistence. Records are grouped by namespace (one per analyzed
//! repository) and are insert-once: inserting an id that already exists
//! in the namespace is ignored, so re-indexing the same chunks never
//! duplicates vectors. Records are removed only by explicit namespace or
//! id-list deletion.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ChunkType, CodeChunk};

/// A stored embedding plus the chunk metadata needed for filtering and
/// result display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    /// Chunk id.
    pub id: String,
    pub namespace: String,
    pub embedding: Vec<f32>,
    pub chunk_type: ChunkType,
    pub path: String,
    pub language: Option<String>,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub content_hash: String,
}

impl VectorRecord {
    pub fn from_chunk(namespace: &str, chunk: &CodeChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            namespace: namespace.to_string(),
            embedding,
            chunk_type: chunk.chunk_type,
            path: chunk.metadata.path.clone(),
            language: chunk.metadata.language.clone(),
            name: chunk.metadata.name.clone(),
            start_line: chunk.metadata.start_line,
            end_line: chunk.metadata.end_line,
            content: chunk.content.clone(),
            content_hash: chunk.hash.clone(),
        }
    }
}

/// Exact-match constraints applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorFilter {
    pub namespace: Option<String>,
    pub chunk_type: Option<ChunkType>,
    pub language: Option<String>,
}

impl VectorFilter {
    pub fn matches(&self, record: &VectorRecord) -> bool {
        if let Some(ns) = &self.namespace {
            if &record.namespace != ns {
                return false;
            }
        }
        if let Some(t) = self.chunk_type {
            if record.chunk_type != t {
                return false;
            }
        }
        if let Some(lang) = &self.language {
            if record.language.as_deref() != Some(lang.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A scored query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMatch {
    pub record: VectorRecord,
    /// Cosine similarity with the query vector.
    pub score: f32,
}

/// Abstract vector storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](VectorStore::insert) | Insert records, ignoring ids already present |
/// | [`query`](VectorStore::query) | Cosine-ranked records passing a filter |
/// | [`delete_namespace`](VectorStore::delete_namespace) | Remove a whole namespace |
/// | [`delete_ids`](VectorStore::delete_ids) | Remove specific ids in a namespace |
/// | [`count`](VectorStore::count) | Records in a namespace, or in total |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records. Returns how many were newly stored.
    async fn insert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Top `limit` records by cosine similarity, descending.
    async fn query(&self, vector: &[f32], filter: &VectorFilter, limit: usize) -> Result<Vec<VectorMatch>>;

    /// Returns the number of records removed.
    async fn delete_namespace(&self, namespace: &str) -> Result<usize>;

    /// Returns the number of records removed.
    async fn delete_ids(&self, namespace: &str, ids: &[String]) -> Result<usize>;

    async fn count(&self, namespace: Option<&str>) -> Result<usize>;
}

/// Sort matches by score descending, breaking ties by id for determinism.
pub fn rank_matches(matches: &mut [VectorMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
}
