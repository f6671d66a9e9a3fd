//! In-memory [`VectorStore`] implementation.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Queries are a
//! brute-force cosine scan over the records passing the filter.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{rank_matches, VectorFilter, VectorMatch, VectorRecord, VectorStore};

/// In-memory store for tests, the CLI's ephemeral mode and the server
/// when no database is configured.
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut stored = self.records.write().unwrap();
        let mut inserted = 0;
        for record in records {
            let exists = stored
                .iter()
                .any(|r| r.namespace == record.namespace && r.id == record.id);
            if !exists {
                stored.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn query(&self, vector: &[f32], filter: &VectorFilter, limit: usize) -> Result<Vec<VectorMatch>> {
        let stored = self.records.read().unwrap();
        let mut matches: Vec<VectorMatch> = stored
            .iter()
            .filter(|r| r.embedding.len() == vector.len() && filter.matches(r))
            .map(|r| VectorMatch {
                score: cosine_similarity(vector, &r.embedding),
                record: r.clone(),
            })
            .collect();
        rank_matches(&mut matches);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let mut stored = self.records.write().unwrap();
        let before = stored.len();
        stored.retain(|r| r.namespace != namespace);
        Ok(before - stored.len())
    }

    async fn delete_ids(&self, namespace: &str, ids: &[String]) -> Result<usize> {
        let mut stored = self.records.write().unwrap();
        let before = stored.len();
        stored.retain(|r| !(r.namespace == namespace && ids.contains(&r.id)));
        Ok(before - stored.len())
    }

    async fn count(&self, namespace: Option<&str>) -> Result<usize> {
        let stored = self.records.read().unwrap();
        Ok(match namespace {
            Some(ns) => stored.iter().filter(|r| r.namespace == ns).count(),
            None => stored.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkType;

    fn record(ns: &str, id: &str, embedding: Vec<f32>, chunk_type: ChunkType) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            namespace: ns.to_string(),
            embedding,
            chunk_type,
            path: format!("src/{}.ts", id),
            language: Some("typescript".to_string()),
            name: Some(id.to_string()),
            start_line: 1,
            end_line: 3,
            content: format!("function {}() {{}}", id),
            content_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_once() {
        let store = InMemoryVectorStore::new();
        let r = record("repo", "a", vec![1.0, 0.0], ChunkType::Function);
        assert_eq!(store.insert(&[r.clone()]).await.unwrap(), 1);
        assert_eq!(store.insert(&[r.clone()]).await.unwrap(), 0);
        assert_eq!(store.count(Some("repo")).await.unwrap(), 1);

        let other_ns = record("other", "a", vec![1.0, 0.0], ChunkType::Function);
        assert_eq!(store.insert(&[other_ns]).await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_ranks_and_filters() {
        let store = InMemoryVectorStore::new();
        store
            .insert(&[
                record("repo", "near", vec![1.0, 0.1], ChunkType::Function),
                record("repo", "far", vec![0.0, 1.0], ChunkType::Function),
                record("repo", "typed", vec![1.0, 0.0], ChunkType::Type),
                record("other", "elsewhere", vec![1.0, 0.0], ChunkType::Function),
            ])
            .await
            .unwrap();

        let filter = VectorFilter {
            namespace: Some("repo".into()),
            chunk_type: Some(ChunkType::Function),
            language: None,
        };
        let matches = store.query(&[1.0, 0.0], &filter, 10).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(matches[0].score > matches[1].score);

        let limited = store.query(&[1.0, 0.0], &VectorFilter::default(), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_deletes() {
        let store = InMemoryVectorStore::new();
        store
            .insert(&[
                record("repo", "a", vec![1.0], ChunkType::Function),
                record("repo", "b", vec![1.0], ChunkType::Function),
                record("keep", "a", vec![1.0], ChunkType::Function),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_ids("repo", &["a".to_string()]).await.unwrap(), 1);
        assert_eq!(store.count(Some("keep")).await.unwrap(), 1);
        assert_eq!(store.delete_namespace("repo").await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }
}
