//! Semantic search over a [`VectorStore`].
//!
//! The caller embeds the query text; this module applies exact-match
//! filters (namespace, chunk type, language), ranks by cosine similarity,
//! drops results under `min_score`, and truncates to `limit`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::ChunkType;
use crate::store::{VectorFilter, VectorMatch, VectorStore};

/// Hard upper bound on results per query.
pub const MAX_LIMIT: usize = 100;

/// Query-time options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    pub namespace: Option<String>,
    pub limit: usize,
    #[serde(rename = "type")]
    pub chunk_type: Option<ChunkType>,
    pub language: Option<String>,
    pub min_score: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            limit: 10,
            chunk_type: None,
            language: None,
            min_score: 0.0,
        }
    }
}

impl SearchOptions {
    pub fn filter(&self) -> VectorFilter {
        VectorFilter {
            namespace: self.namespace.clone(),
            chunk_type: self.chunk_type,
            language: self.language.clone(),
        }
    }
}

/// One search hit, shaped for JSON responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

impl From<VectorMatch> for SearchResult {
    fn from(m: VectorMatch) -> Self {
        let r = m.record;
        Self {
            id: r.id,
            score: m.score,
            chunk_type: r.chunk_type,
            path: r.path,
            name: r.name,
            language: r.language,
            start_line: r.start_line,
            end_line: r.end_line,
            content: r.content,
        }
    }
}

/// Rank stored vectors against an embedded query.
pub async fn search_vectors<S: VectorStore + ?Sized>(
    store: &S,
    query_vec: &[f32],
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let limit = options.limit.clamp(1, MAX_LIMIT);
    let matches = store.query(query_vec, &options.filter(), limit).await?;
    Ok(matches
        .into_iter()
        .filter(|m| m.score >= options.min_score)
        .map(SearchResult::from)
        .collect())
}
