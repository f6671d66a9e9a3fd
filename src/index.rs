//! The vector index service: embeds chunks into a [`VectorStore`] and
//! answers semantic queries against it.

use anyhow::Result;
use repo_intake_core::embedding::embedding_input;
use repo_intake_core::models::CodeChunk;
use repo_intake_core::search::{search_vectors, SearchOptions, SearchResult};
use repo_intake_core::store::{VectorRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::sqlite_store::SqliteVectorStore;
use crate::{db, migrate};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Vectors newly stored. Chunks already present in the namespace are
    /// not counted.
    pub indexed_count: usize,
    pub errors: Vec<String>,
}

/// Results for one query of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub matches: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and store `chunks` under `namespace`, one batch at a time.
    ///
    /// A failing batch is recorded in `errors` and skipped; later batches
    /// still run.
    pub async fn index(&self, chunks: &[CodeChunk], namespace: &str) -> IndexReport {
        let mut report = IndexReport::default();

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let inputs: Vec<String> = batch.iter().map(embedding_input).collect();
            let vectors = match self.embedder.embed(&inputs).await {
                Ok(v) if v.len() == batch.len() => v,
                Ok(v) => {
                    report.errors.push(format!(
                        "batch {}: embedder returned {} vectors for {} chunks",
                        batch_no,
                        v.len(),
                        batch.len()
                    ));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(batch = batch_no, error = %e, "embedding batch failed");
                    report.errors.push(format!("batch {}: {}", batch_no, e));
                    continue;
                }
            };

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, embedding)| VectorRecord::from_chunk(namespace, chunk, embedding))
                .collect();

            match self.store.insert(&records).await {
                Ok(n) => report.indexed_count += n,
                Err(e) => {
                    tracing::warn!(batch = batch_no, error = %e, "vector insert failed");
                    report.errors.push(format!("batch {}: {}", batch_no, e));
                }
            }
        }

        tracing::debug!(
            namespace,
            indexed = report.indexed_count,
            errors = report.errors.len(),
            "indexing finished"
        );
        report
    }

    /// Embed `query` once and rank stored vectors against it.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        search_vectors(self.store.as_ref(), &vector, options).await
    }

    /// Run several queries with shared options. All queries are embedded
    /// in one provider call.
    pub async fn batch_search(&self, queries: &[String], options: &SearchOptions) -> Result<Vec<QueryResults>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed(queries).await?;
        if vectors.len() != queries.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} queries",
                vectors.len(),
                queries.len()
            );
        }
        let mut out = Vec::with_capacity(queries.len());
        for (query, vector) in queries.iter().zip(vectors) {
            out.push(QueryResults {
                query: query.clone(),
                matches: search_vectors(self.store.as_ref(), &vector, options).await?,
            });
        }
        Ok(out)
    }

    pub async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        self.store.delete_namespace(namespace).await
    }

    pub async fn delete_ids(&self, namespace: &str, ids: &[String]) -> Result<usize> {
        self.store.delete_ids(namespace, ids).await
    }
}

/// Open the persistent index: SQLite store plus the configured embedder.
pub async fn open_sqlite_index(config: &Config) -> Result<VectorIndex> {
    let pool = db::connect(&config.index).await?;
    migrate::run_migrations(&pool).await?;
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
    Ok(VectorIndex::new(
        Arc::new(SqliteVectorStore::new(pool)),
        embedder,
        config.index.batch_size,
    ))
}
